use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use campus_auth::RegisterInput;

use crate::{
    extract::ApiJson,
    models::user::{
        ChangePasswordRequest, LoginRequest, RegisterRequest, ResendVerificationRequest,
        SessionResponse, UserResponse, VerifyEmailRequest,
    },
    models::{ApiResponse, MessageResponse},
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created; a verification code is emailed", body = UserResponse),
        (status = 400, description = "Invalid registration payload", body = crate::error::ErrorResponse),
        (status = 409, description = "Email or username already taken", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state
        .authenticator()
        .register(RegisterInput {
            email: req.email,
            username: req.username,
            password: req.password,
            display_name: req.display_name,
        })
        .await?;

    Ok(ApiResponse::created(UserResponse::from(user)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session issued", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse),
        (status = 403, description = "Account disabled or email not verified", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<ApiResponse<SessionResponse>>, ApiError> {
    let session = state
        .authenticator()
        .login(&req.identifier, &req.password)
        .await?;

    Ok(ApiResponse::ok(SessionResponse::from(session)))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/verify",
    tag = "Auth",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified", body = UserResponse),
        (status = 400, description = "Invalid or expired code", body = crate::error::ErrorResponse)
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = state
        .authenticator()
        .verify_email(&req.email, &req.code)
        .await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

/// Always answers the same way so the endpoint cannot reveal
/// which addresses are registered.
#[utoipa::path(
    post,
    path = "/api/v1/auth/resend-verification",
    tag = "Auth",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Code re-sent if the account exists", body = MessageResponse)
    )
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResendVerificationRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.authenticator().resend_verification(&req.email).await?;

    Ok(ApiResponse::ok(MessageResponse::new(
        "If the account exists and is unverified, a new code has been sent",
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    Ok(ApiResponse::ok(UserResponse::from(user)))
}

#[utoipa::path(
    put,
    path = "/api/v1/auth/password",
    tag = "Auth",
    security(("bearerAuth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "New password rejected", body = crate::error::ErrorResponse),
        (status = 401, description = "Current password is wrong", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;

    state
        .authenticator()
        .change_password(user.id, &req.current_password, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(MessageResponse::new("Password updated")))
}
