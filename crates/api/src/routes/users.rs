use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    extract::{ApiJson, ApiPath},
    models::user::{UpdateProfileRequest, UserProfile, UserResponse},
    models::ApiResponse,
    services::users,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/v1/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Public profile", body = UserProfile),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> Result<Json<ApiResponse<UserProfile>>, ApiError> {
    let profile = users::get_profile(state.db_pool(), user_id).await?;
    Ok(ApiResponse::ok(profile))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "Users",
    security(("bearerAuth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid profile payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    let updated = users::update_profile(state.db_pool(), user.id, req).await?;
    Ok(ApiResponse::ok(UserResponse::from(updated)))
}
