use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};

use crate::{
    extract::{ApiJson, ApiPath, ApiQuery},
    models::message::{
        ConversationSummary, CreateConversationRequest, DirectMessage, SendMessageRequest,
    },
    models::{ApiResponse, BulkUpdateResponse, PageQuery, Pagination},
    services::messaging,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(PageQuery),
    responses(
        (status = 200, description = "Conversations, most recent activity first", body = [ConversationSummary]),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<ConversationSummary>>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let page = query.page();
    let (conversations, total) =
        messaging::list_conversations(state.db_pool(), user.id, page).await?;
    Ok(ApiResponse::paginated(conversations, Pagination::new(page, total)))
}

/// Returns 201 when the conversation is new and 200 when it already existed.
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    request_body = CreateConversationRequest,
    responses(
        (status = 200, description = "Existing conversation", body = ConversationSummary),
        (status = 201, description = "Conversation started", body = ConversationSummary),
        (status = 400, description = "Cannot message yourself", body = crate::error::ErrorResponse),
        (status = 404, description = "Peer not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_conversation(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CreateConversationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ConversationSummary>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let (conversation, created) =
        messaging::get_or_create_conversation(state.db_pool(), &user, req.peer_id).await?;

    if created {
        Ok(ApiResponse::created(conversation))
    } else {
        Ok((StatusCode::OK, ApiResponse::ok(conversation)))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Conversation id"), PageQuery),
    responses(
        (status = 200, description = "Messages, newest first", body = [DirectMessage]),
        (status = 403, description = "Not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Conversation not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<ApiResponse<Vec<DirectMessage>>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let page = query.page();
    let (messages, total) =
        messaging::list_messages(state.db_pool(), user.id, conversation_id, page).await?;
    Ok(ApiResponse::paginated(messages, Pagination::new(page, total)))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Conversation id")),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent; the peer is notified", body = DirectMessage),
        (status = 400, description = "Empty or oversized message", body = crate::error::ErrorResponse),
        (status = 403, description = "Not a participant", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(conversation_id): ApiPath<i64>,
    ApiJson(req): ApiJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<DirectMessage>>), ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let message =
        messaging::send_message(state.db_pool(), &user, conversation_id, &req.content).await?;
    Ok(ApiResponse::created(message))
}

#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/read",
    tag = "Messaging",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Peer messages marked read", body = BulkUpdateResponse),
        (status = 403, description = "Not a participant", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(conversation_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<BulkUpdateResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let updated = messaging::mark_read(state.db_pool(), user.id, conversation_id).await?;
    Ok(ApiResponse::ok(BulkUpdateResponse { updated }))
}
