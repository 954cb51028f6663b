use campus_auth::{validation, User, USER_COLUMNS};
use sqlx::PgPool;

use super::error::{optional_text, ServiceError};
use crate::models::user::{UpdateProfileRequest, UserProfile};

pub async fn get_profile(pool: &PgPool, user_id: i64) -> Result<UserProfile, ServiceError> {
    sqlx::query_as::<_, UserProfile>(
        "SELECT id, username, display_name, avatar_url, bio, role, created_at \
         FROM users WHERE id = $1 AND is_active",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("User not found"))
}

/// Apply a partial profile update. Absent fields are left alone; an empty
/// avatar or bio clears it.
pub async fn update_profile(
    pool: &PgPool,
    user_id: i64,
    req: UpdateProfileRequest,
) -> Result<User, ServiceError> {
    let display_name = match req.display_name.as_deref() {
        Some(name) => {
            let name = name.trim();
            validation::validate_display_name(name)?;
            Some(name.to_string())
        }
        None => None,
    };

    if let Some(url) = req.avatar_url.as_deref() {
        validation::validate_url(url.trim())?;
    }
    let avatar_url = optional_text("avatar_url", req.avatar_url.as_deref(), 2048)?;
    let bio = optional_text("bio", req.bio.as_deref(), 500)?;

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
             display_name = COALESCE($2, display_name), \
             avatar_url = CASE WHEN $3 THEN $4 ELSE avatar_url END, \
             bio = CASE WHEN $5 THEN $6 ELSE bio END, \
             updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(display_name)
    .bind(req.avatar_url.is_some())
    .bind(avatar_url)
    .bind(req.bio.is_some())
    .bind(bio)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("User not found"))?;

    tracing::info!(user_id, "profile updated");
    Ok(user)
}
