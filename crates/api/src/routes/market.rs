use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::{
    extract::{ApiJson, ApiPath, ApiQuery},
    models::market::{
        CreateCommentRequest, CreateItemRequest, ItemComment, ItemListQuery, MarketItem,
        UpdateItemRequest,
    },
    models::{ApiResponse, MessageResponse, Pagination},
    services::{comments, market},
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/market/items",
    tag = "Marketplace",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Paginated item listing", body = [MarketItem]),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_items(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ItemListQuery>,
) -> Result<Json<ApiResponse<Vec<MarketItem>>>, ApiError> {
    let page = query.page();
    let (items, total) = market::list_items(state.db_pool(), &query.filter(), page).await?;
    Ok(ApiResponse::paginated(items, Pagination::new(page, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/market/items",
    tag = "Marketplace",
    security(("bearerAuth" = [])),
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item listed", body = MarketItem),
        (status = 400, description = "Invalid item payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MarketItem>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let item = market::create_item(state.db_pool(), &user, req).await?;
    Ok(ApiResponse::created(item))
}

#[utoipa::path(
    get,
    path = "/api/v1/market/items/{id}",
    tag = "Marketplace",
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item detail; counts as a view", body = MarketItem),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_item(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MarketItem>>, ApiError> {
    let item = market::view_item(state.db_pool(), item_id).await?;
    Ok(ApiResponse::ok(item))
}

#[utoipa::path(
    put,
    path = "/api/v1/market/items/{id}",
    tag = "Marketplace",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = MarketItem),
        (status = 400, description = "Invalid update payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Not the seller", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(item_id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> Result<Json<ApiResponse<MarketItem>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let item = market::update_item(state.db_pool(), &user, item_id, req).await?;
    Ok(ApiResponse::ok(item))
}

#[utoipa::path(
    delete,
    path = "/api/v1/market/items/{id}",
    tag = "Marketplace",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted", body = MessageResponse),
        (status = 403, description = "Not the seller", body = crate::error::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_item(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(item_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    market::delete_item(state.db_pool(), &user, item_id).await?;
    Ok(ApiResponse::ok(MessageResponse::new("Item deleted")))
}

#[utoipa::path(
    get,
    path = "/api/v1/market/items/{id}/comments",
    tag = "Marketplace",
    params(("id" = i64, Path, description = "Item id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [ItemComment]),
        (status = 404, description = "Item not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    ApiPath(item_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Vec<ItemComment>>>, ApiError> {
    let comments = comments::list_comments(state.db_pool(), item_id).await?;
    Ok(ApiResponse::ok(comments))
}

#[utoipa::path(
    post,
    path = "/api/v1/market/items/{id}/comments",
    tag = "Marketplace",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Item id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment posted", body = ItemComment),
        (status = 400, description = "Invalid comment", body = crate::error::ErrorResponse),
        (status = 404, description = "Item or parent comment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(item_id): ApiPath<i64>,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ItemComment>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let comment = comments::create_comment(state.db_pool(), &user, item_id, req).await?;
    Ok(ApiResponse::created(comment))
}

#[utoipa::path(
    delete,
    path = "/api/v1/market/comments/{id}",
    tag = "Marketplace",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment deleted", body = MessageResponse),
        (status = 403, description = "Not the author, seller or staff", body = crate::error::ErrorResponse),
        (status = 404, description = "Comment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(comment_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    comments::delete_comment(state.db_pool(), &user, comment_id).await?;
    Ok(ApiResponse::ok(MessageResponse::new("Comment deleted")))
}
