use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    extract::{ApiPath, ApiQuery},
    models::notification::{Notification, NotificationListQuery, UnreadCountResponse},
    models::{ApiResponse, BulkUpdateResponse, MessageResponse, Pagination},
    services::notifications,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(NotificationListQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = [Notification]),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<NotificationListQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let page = query.page();
    let (items, total) = notifications::list_notifications(
        state.db_pool(),
        user.id,
        query.unread_only.unwrap_or(false),
        page,
    )
    .await?;
    Ok(ApiResponse::paginated(items, Pagination::new(page, total)))
}

#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Unread notification count", body = UnreadCountResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UnreadCountResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let unread_count = notifications::get_unread_count(state.db_pool(), user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { unread_count }))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(notification_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<Notification>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let notification =
        notifications::mark_notification_read(state.db_pool(), user.id, notification_id).await?;
    Ok(ApiResponse::ok(notification))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "All notifications marked read", body = BulkUpdateResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<BulkUpdateResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let updated = notifications::mark_all_read(state.db_pool(), user.id).await?;
    Ok(ApiResponse::ok(BulkUpdateResponse { updated }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Notification deleted", body = MessageResponse),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(notification_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    notifications::delete_notification(state.db_pool(), user.id, notification_id).await?;
    Ok(ApiResponse::ok(MessageResponse::new("Notification deleted")))
}
