use campus_auth::{Role, User, USER_COLUMNS};
use sqlx::PgPool;

use super::error::ServiceError;
use crate::models::admin::{AdminUpdateUserRequest, DashboardStats};
use crate::models::Page;

/// Aggregate counts for the admin dashboard, gathered in one round trip.
pub async fn stats(pool: &PgPool) -> Result<DashboardStats, ServiceError> {
    let stats = sqlx::query_as::<_, DashboardStats>(
        "SELECT \
             (SELECT COUNT(*) FROM users) AS users_total, \
             (SELECT COUNT(*) FROM users WHERE is_active) AS users_active, \
             (SELECT COUNT(*) FROM users WHERE created_at >= now() - interval '7 days') AS users_new_last_7_days, \
             (SELECT COUNT(*) FROM market_items) AS items_total, \
             (SELECT COUNT(*) FROM market_items WHERE status = 'available') AS items_available, \
             (SELECT COUNT(*) FROM item_comments) AS comments_total, \
             (SELECT COUNT(*) FROM rides) AS rides_total, \
             (SELECT COUNT(*) FROM rides WHERE status = 'open') AS rides_open, \
             (SELECT COUNT(*) FROM groups) AS groups_total, \
             (SELECT COUNT(*) FROM direct_messages) AS direct_messages_total, \
             (SELECT COUNT(*) FROM group_messages) AS group_messages_total",
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

const USER_FILTER: &str = "WHERE ($1::text IS NULL OR email ILIKE $1 OR username ILIKE $1 OR display_name ILIKE $1) \
     AND ($2::text IS NULL OR role = $2) \
     AND ($3::boolean IS NULL OR is_active = $3)";

pub async fn list_users(
    pool: &PgPool,
    pattern: Option<String>,
    role: Option<String>,
    is_active: Option<bool>,
    page: Page,
) -> Result<(Vec<User>, i64), ServiceError> {
    let role = role.map(|role| parse_role(&role)).transpose()?;
    let role = role.map(Role::as_str);

    let users = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users {USER_FILTER} \
         ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
    ))
    .bind(&pattern)
    .bind(role)
    .bind(is_active)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {USER_FILTER}"))
        .bind(&pattern)
        .bind(role)
        .bind(is_active)
        .fetch_one(pool)
        .await?;

    Ok((users, total))
}

/// Change a user's role or active flag. Admins cannot demote or deactivate
/// their own account.
pub async fn update_user(
    pool: &PgPool,
    actor: &User,
    user_id: i64,
    req: AdminUpdateUserRequest,
) -> Result<User, ServiceError> {
    let role = req.role.as_deref().map(parse_role).transpose()?;

    if actor.id == user_id {
        if role.is_some_and(|role| role != actor.role) {
            return Err(ServiceError::bad_request("you cannot change your own role"));
        }
        if req.is_active == Some(false) {
            return Err(ServiceError::bad_request("you cannot deactivate your own account"));
        }
    }

    let user = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET \
             role = COALESCE($2, role), \
             is_active = COALESCE($3, is_active), \
             updated_at = now() \
         WHERE id = $1 RETURNING {USER_COLUMNS}"
    ))
    .bind(user_id)
    .bind(role.map(Role::as_str))
    .bind(req.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("User not found"))?;

    tracing::info!(
        user_id,
        actor_id = actor.id,
        role = %user.role,
        is_active = user.is_active,
        "user updated by admin"
    );
    Ok(user)
}

fn parse_role(role: &str) -> Result<Role, ServiceError> {
    role.trim()
        .parse::<Role>()
        .map_err(|_| ServiceError::bad_request("role must be one of: user, moderator, admin"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_parse_or_reject() {
        assert_eq!(parse_role("admin").unwrap(), Role::Admin);
        assert_eq!(parse_role(" moderator ").unwrap(), Role::Moderator);
        assert!(matches!(parse_role("root"), Err(ServiceError::BadRequest(_))));
    }
}
