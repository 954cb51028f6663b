use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::{
    extract::{ApiJson, ApiPath, ApiQuery},
    models::group::{
        CreateGroupRequest, Group, GroupDetail, GroupListQuery, GroupMember, GroupMessage,
        PostGroupMessageRequest, UpdateGroupRequest,
    },
    models::{ApiResponse, MessageResponse, PageQuery, Pagination},
    services::groups,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/groups",
    tag = "Groups",
    params(GroupListQuery),
    responses(
        (status = 200, description = "Groups, newest first", body = [Group])
    )
)]
pub async fn list_groups(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<GroupListQuery>,
) -> Result<Json<ApiResponse<Vec<Group>>>, ApiError> {
    let page = query.page();
    let (items, total) =
        groups::list_groups(state.db_pool(), query.pattern(), query.category(), page).await?;
    Ok(ApiResponse::paginated(items, Pagination::new(page, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups",
    tag = "Groups",
    security(("bearerAuth" = [])),
    request_body = CreateGroupRequest,
    responses(
        (status = 201, description = "Group created; the caller is its owner", body = GroupDetail),
        (status = 400, description = "Invalid group payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupDetail>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let group = groups::create_group(state.db_pool(), &user, req).await?;
    Ok(ApiResponse::created(group))
}

/// Public; `viewer_role` is filled in when a valid token is supplied.
#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}",
    tag = "Groups",
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group detail", body = GroupDetail),
        (status = 404, description = "Group not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<GroupDetail>>, ApiError> {
    let token = require_bearer(&headers).ok();
    let viewer = state.authenticate_optional(token.as_deref()).await?;

    let group = groups::get_group(state.db_pool(), group_id, viewer.map(|user| user.id)).await?;
    Ok(ApiResponse::ok(group))
}

#[utoipa::path(
    put,
    path = "/api/v1/groups/{id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id")),
    request_body = UpdateGroupRequest,
    responses(
        (status = 200, description = "Group updated", body = GroupDetail),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 409, description = "Name already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateGroupRequest>,
) -> Result<Json<ApiResponse<GroupDetail>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let group = groups::update_group(state.db_pool(), &user, group_id, req).await?;
    Ok(ApiResponse::ok(group))
}

#[utoipa::path(
    delete,
    path = "/api/v1/groups/{id}",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Group deleted", body = MessageResponse),
        (status = 403, description = "Not the owner", body = crate::error::ErrorResponse),
        (status = 404, description = "Group not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    groups::delete_group(state.db_pool(), &user, group_id).await?;
    Ok(ApiResponse::ok(MessageResponse::new("Group deleted")))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{id}/join",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Joined the group", body = GroupDetail),
        (status = 404, description = "Group not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Already a member", body = crate::error::ErrorResponse)
    )
)]
pub async fn join_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<GroupDetail>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let group = groups::join_group(state.db_pool(), &user, group_id).await?;
    Ok(ApiResponse::ok(group))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{id}/leave",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id")),
    responses(
        (status = 200, description = "Left the group", body = MessageResponse),
        (status = 400, description = "Owners cannot leave", body = crate::error::ErrorResponse),
        (status = 404, description = "Group not found or not a member", body = crate::error::ErrorResponse)
    )
)]
pub async fn leave_group(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    groups::leave_group(state.db_pool(), &user, group_id).await?;
    Ok(ApiResponse::ok(MessageResponse::new("Left group")))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}/members",
    tag = "Groups",
    params(("id" = i64, Path, description = "Group id"), PageQuery),
    responses(
        (status = 200, description = "Members, owner first", body = [GroupMember]),
        (status = 404, description = "Group not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    ApiPath(group_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<GroupMember>>>, ApiError> {
    let page = query.page();
    let (members, total) = groups::list_members(state.db_pool(), group_id, page).await?;
    Ok(ApiResponse::paginated(members, Pagination::new(page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/groups/{id}/messages",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id"), PageQuery),
    responses(
        (status = 200, description = "Group messages, newest first", body = [GroupMessage]),
        (status = 403, description = "Not a member", body = crate::error::ErrorResponse),
        (status = 404, description = "Group not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<GroupMessage>>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let page = query.page();
    let (messages, total) = groups::list_messages(state.db_pool(), &user, group_id, page).await?;
    Ok(ApiResponse::paginated(messages, Pagination::new(page, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/groups/{id}/messages",
    tag = "Groups",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Group id")),
    request_body = PostGroupMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = GroupMessage),
        (status = 400, description = "Empty or oversized message", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a member", body = crate::error::ErrorResponse)
    )
)]
pub async fn post_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(group_id): ApiPath<i64>,
    ApiJson(req): ApiJson<PostGroupMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<GroupMessage>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let message = groups::post_message(state.db_pool(), &user, group_id, &req.content).await?;
    Ok(ApiResponse::created(message))
}
