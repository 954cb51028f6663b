use sqlx::{PgExecutor, PgPool};

use super::error::ServiceError;
use crate::models::notification::{NewNotification, Notification};
use crate::models::Page;

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, title, body, related_entity_type, \
     related_entity_id, is_read, created_at";

pub async fn list_notifications(
    pool: &PgPool,
    user_id: i64,
    unread_only: bool,
    page: Page,
) -> Result<(Vec<Notification>, i64), ServiceError> {
    let notifications = sqlx::query_as::<_, Notification>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
         WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE) \
         ORDER BY created_at DESC, id DESC \
         LIMIT $3 OFFSET $4"
    ))
    .bind(user_id)
    .bind(unread_only)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR is_read = FALSE)",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(pool)
    .await?;

    Ok((notifications, total))
}

pub async fn get_unread_count(pool: &PgPool, user_id: i64) -> Result<i64, ServiceError> {
    let count = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

pub async fn mark_notification_read(
    pool: &PgPool,
    user_id: i64,
    notification_id: i64,
) -> Result<Notification, ServiceError> {
    sqlx::query_as::<_, Notification>(&format!(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2 \
         RETURNING {NOTIFICATION_COLUMNS}"
    ))
    .bind(notification_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Notification not found"))
}

pub async fn mark_all_read(pool: &PgPool, user_id: i64) -> Result<u64, ServiceError> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE")
            .bind(user_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

pub async fn delete_notification(
    pool: &PgPool,
    user_id: i64,
    notification_id: i64,
) -> Result<(), ServiceError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("Notification not found"));
    }

    Ok(())
}

/// Store a notification. Runs on a pool or inside the caller's transaction.
pub async fn create_notification<'e, E>(
    executor: E,
    notification: &NewNotification,
) -> Result<i64, ServiceError>
where
    E: PgExecutor<'e>,
{
    let (entity_type, entity_id) = match notification.related {
        Some((entity_type, entity_id)) => (Some(entity_type), Some(entity_id)),
        None => (None, None),
    };

    let id = sqlx::query_scalar(
        "INSERT INTO notifications (user_id, kind, title, body, related_entity_type, related_entity_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(entity_type)
    .bind(entity_id)
    .fetch_one(executor)
    .await?;

    Ok(id)
}

/// Shorten message bodies for notification previews.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    shortened.push('…');
    shortened
}
