use campus_auth::User;
use sqlx::PgPool;

use super::error::{require_text, ServiceError};
use super::notifications::{create_notification, preview};
use crate::models::message::{ConversationSummary, DirectMessage};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::Page;

const SUMMARY_SELECT: &str = "SELECT c.id, p.id AS peer_id, p.username AS peer_username, \
     p.display_name AS peer_display_name, p.avatar_url AS peer_avatar_url, \
     last.content AS last_message, c.last_message_at, \
     (SELECT COUNT(*) FROM direct_messages m \
        WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.read_at IS NULL) AS unread_count, \
     c.created_at \
     FROM conversations c \
     JOIN users p ON p.id = CASE WHEN c.user_a_id = $1 THEN c.user_b_id ELSE c.user_a_id END \
     LEFT JOIN LATERAL ( \
        SELECT content FROM direct_messages m \
        WHERE m.conversation_id = c.id ORDER BY m.created_at DESC, m.id DESC LIMIT 1 \
     ) last ON TRUE";

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, read_at, created_at";

/// Conversations are stored with the smaller user id first.
fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

pub async fn list_conversations(
    pool: &PgPool,
    user_id: i64,
    page: Page,
) -> Result<(Vec<ConversationSummary>, i64), ServiceError> {
    let conversations = sqlx::query_as::<_, ConversationSummary>(&format!(
        "{SUMMARY_SELECT} WHERE c.user_a_id = $1 OR c.user_b_id = $1 \
         ORDER BY COALESCE(c.last_message_at, c.created_at) DESC, c.id DESC \
         LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM conversations WHERE user_a_id = $1 OR user_b_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok((conversations, total))
}

/// Find the conversation with `peer_id`, creating it if needed. The flag is
/// `true` when a new conversation was created.
pub async fn get_or_create_conversation(
    pool: &PgPool,
    user: &User,
    peer_id: i64,
) -> Result<(ConversationSummary, bool), ServiceError> {
    if peer_id == user.id {
        return Err(ServiceError::bad_request("cannot start a conversation with yourself"));
    }

    let peer_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(peer_id)
        .fetch_optional(pool)
        .await?;
    if peer_active != Some(true) {
        return Err(ServiceError::not_found("User not found"));
    }

    let (user_a, user_b) = ordered_pair(user.id, peer_id);
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO conversations (user_a_id, user_b_id) VALUES ($1, $2) \
         ON CONFLICT (user_a_id, user_b_id) DO NOTHING RETURNING id",
    )
    .bind(user_a)
    .bind(user_b)
    .fetch_optional(pool)
    .await?;

    let created = inserted.is_some();
    let conversation_id = match inserted {
        Some(id) => {
            tracing::info!(conversation_id = id, user_id = user.id, peer_id, "conversation started");
            id
        }
        None => {
            sqlx::query_scalar("SELECT id FROM conversations WHERE user_a_id = $1 AND user_b_id = $2")
                .bind(user_a)
                .bind(user_b)
                .fetch_one(pool)
                .await?
        }
    };

    let summary = fetch_summary(pool, user.id, conversation_id).await?;
    Ok((summary, created))
}

/// Returns the other participant, or 403 if `user_id` is not in the conversation.
pub async fn ensure_participant(
    pool: &PgPool,
    user_id: i64,
    conversation_id: i64,
) -> Result<i64, ServiceError> {
    let pair: (i64, i64) =
        sqlx::query_as("SELECT user_a_id, user_b_id FROM conversations WHERE id = $1")
            .bind(conversation_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("Conversation not found"))?;

    match pair {
        (a, b) if a == user_id => Ok(b),
        (a, b) if b == user_id => Ok(a),
        _ => Err(ServiceError::forbidden("not a participant of this conversation")),
    }
}

/// Messages newest first.
pub async fn list_messages(
    pool: &PgPool,
    user_id: i64,
    conversation_id: i64,
    page: Page,
) -> Result<(Vec<DirectMessage>, i64), ServiceError> {
    ensure_participant(pool, user_id, conversation_id).await?;

    let messages = sqlx::query_as::<_, DirectMessage>(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM direct_messages WHERE conversation_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(conversation_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM direct_messages WHERE conversation_id = $1")
            .bind(conversation_id)
            .fetch_one(pool)
            .await?;

    Ok((messages, total))
}

pub async fn send_message(
    pool: &PgPool,
    sender: &User,
    conversation_id: i64,
    content: &str,
) -> Result<DirectMessage, ServiceError> {
    let content = require_text("content", content, 2000)?;
    let peer_id = ensure_participant(pool, sender.id, conversation_id).await?;

    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, DirectMessage>(&format!(
        "INSERT INTO direct_messages (conversation_id, sender_id, content) \
         VALUES ($1, $2, $3) RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(conversation_id)
    .bind(sender.id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
        .bind(conversation_id)
        .bind(message.created_at)
        .execute(&mut *tx)
        .await?;

    create_notification(
        &mut *tx,
        &NewNotification {
            user_id: peer_id,
            kind: NotificationKind::DirectMessage,
            title: format!("New message from {}", sender.display_name),
            body: preview(&content, 140),
            related: Some(("conversation", conversation_id)),
        },
    )
    .await?;

    tx.commit().await?;
    tracing::debug!(conversation_id, message_id = message.id, "direct message sent");
    Ok(message)
}

/// Mark the peer's messages as read. Returns how many changed.
pub async fn mark_read(pool: &PgPool, user_id: i64, conversation_id: i64) -> Result<u64, ServiceError> {
    ensure_participant(pool, user_id, conversation_id).await?;

    let result = sqlx::query(
        "UPDATE direct_messages SET read_at = now() \
         WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL",
    )
    .bind(conversation_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

async fn fetch_summary(
    pool: &PgPool,
    user_id: i64,
    conversation_id: i64,
) -> Result<ConversationSummary, ServiceError> {
    sqlx::query_as::<_, ConversationSummary>(&format!("{SUMMARY_SELECT} WHERE c.id = $2"))
        .bind(user_id)
        .bind(conversation_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Conversation not found"))
}

#[cfg(test)]
mod tests {
    use super::ordered_pair;

    #[test]
    fn pairs_are_normalised() {
        assert_eq!(ordered_pair(7, 3), (3, 7));
        assert_eq!(ordered_pair(3, 7), (3, 7));
    }
}
