use axum::{extract::State, http::HeaderMap, Json};
use campus_auth::Role;

use crate::{
    extract::{ApiJson, ApiPath, ApiQuery},
    models::admin::{AdminUpdateUserRequest, AdminUserQuery, DashboardStats},
    models::user::UserResponse,
    models::{ApiResponse, Pagination},
    services::admin,
    util::{require_bearer, require_role},
    ApiError, AppState,
};

const READERS: &[Role] = &[Role::Admin, Role::Moderator];
const WRITERS: &[Role] = &[Role::Admin];

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    tag = "Admin",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Aggregate counts", body = DashboardStats),
        (status = 403, description = "Staff only", body = crate::error::ErrorResponse)
    )
)]
pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<DashboardStats>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;
    require_role(&user, READERS)?;

    let stats = admin::stats(state.db_pool()).await?;
    Ok(ApiResponse::ok(stats))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(AdminUserQuery),
    responses(
        (status = 200, description = "Matching accounts, newest first", body = [UserResponse]),
        (status = 400, description = "Unknown role filter", body = crate::error::ErrorResponse),
        (status = 403, description = "Staff only", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<AdminUserQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    let token = require_bearer(&headers)?;
    let user = state.authenticate(&token).await?;
    require_role(&user, READERS)?;

    let page = query.page();
    let (users, total) = admin::list_users(
        state.db_pool(),
        query.pattern(),
        query.role(),
        query.is_active,
        page,
    )
    .await?;

    let users = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::paginated(users, Pagination::new(page, total)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}",
    tag = "Admin",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = AdminUpdateUserRequest,
    responses(
        (status = 200, description = "Account updated", body = UserResponse),
        (status = 400, description = "Unknown role or self-demotion", body = crate::error::ErrorResponse),
        (status = 403, description = "Admins only", body = crate::error::ErrorResponse),
        (status = 404, description = "User not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(req): ApiJson<AdminUpdateUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let token = require_bearer(&headers)?;
    let actor = state.authenticate(&token).await?;
    require_role(&actor, WRITERS)?;

    let updated = admin::update_user(state.db_pool(), &actor, user_id, req).await?;
    Ok(ApiResponse::ok(UserResponse::from(updated)))
}
