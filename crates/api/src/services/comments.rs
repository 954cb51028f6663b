use campus_auth::User;
use sqlx::PgPool;

use super::error::{require_text, ServiceError};
use super::market::item_seller;
use super::notifications::{create_notification, preview};
use crate::models::market::{CreateCommentRequest, ItemComment};
use crate::models::notification::{NewNotification, NotificationKind};

const COMMENT_SELECT: &str = "SELECT c.id, c.item_id, c.author_id, u.username AS author_username, \
     u.display_name AS author_display_name, u.avatar_url AS author_avatar_url, \
     c.parent_id, c.content, c.created_at \
     FROM item_comments c JOIN users u ON u.id = c.author_id";

/// Comments for an item, oldest first so threads read top to bottom.
pub async fn list_comments(pool: &PgPool, item_id: i64) -> Result<Vec<ItemComment>, ServiceError> {
    item_seller(pool, item_id).await?;

    let comments = sqlx::query_as::<_, ItemComment>(&format!(
        "{COMMENT_SELECT} WHERE c.item_id = $1 ORDER BY c.created_at ASC, c.id ASC"
    ))
    .bind(item_id)
    .fetch_all(pool)
    .await?;

    Ok(comments)
}

pub async fn create_comment(
    pool: &PgPool,
    author: &User,
    item_id: i64,
    req: CreateCommentRequest,
) -> Result<ItemComment, ServiceError> {
    let content = require_text("content", &req.content, 1000)?;

    let mut tx = pool.begin().await?;

    let (seller_id, title): (i64, String) =
        sqlx::query_as("SELECT seller_id, title FROM market_items WHERE id = $1")
            .bind(item_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| ServiceError::not_found("Item not found"))?;

    let parent_author = match req.parent_id {
        Some(parent_id) => {
            let row: Option<(i64, i64)> =
                sqlx::query_as("SELECT item_id, author_id FROM item_comments WHERE id = $1")
                    .bind(parent_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            match row {
                Some((parent_item, parent_author)) if parent_item == item_id => Some(parent_author),
                Some(_) => {
                    return Err(ServiceError::bad_request(
                        "parent comment belongs to a different item",
                    ))
                }
                None => return Err(ServiceError::not_found("Parent comment not found")),
            }
        }
        None => None,
    };

    let comment_id: i64 = sqlx::query_scalar(
        "INSERT INTO item_comments (item_id, author_id, parent_id, content) \
         VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(item_id)
    .bind(author.id)
    .bind(req.parent_id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    if seller_id != author.id {
        create_notification(
            &mut *tx,
            &NewNotification {
                user_id: seller_id,
                kind: NotificationKind::ItemComment,
                title: format!("{} commented on \"{}\"", author.display_name, title),
                body: preview(&content, 140),
                related: Some(("market_item", item_id)),
            },
        )
        .await?;
    }

    if let Some(parent_author) = parent_author {
        if parent_author != author.id && parent_author != seller_id {
            create_notification(
                &mut *tx,
                &NewNotification {
                    user_id: parent_author,
                    kind: NotificationKind::CommentReply,
                    title: format!("{} replied to your comment", author.display_name),
                    body: preview(&content, 140),
                    related: Some(("market_item", item_id)),
                },
            )
            .await?;
        }
    }

    tx.commit().await?;
    tracing::info!(comment_id, item_id, author_id = author.id, "comment posted");

    fetch_comment(pool, comment_id).await
}

pub async fn delete_comment(
    pool: &PgPool,
    actor: &User,
    comment_id: i64,
) -> Result<(), ServiceError> {
    let row: Option<(i64, i64, i64)> = sqlx::query_as(
        "SELECT c.item_id, c.author_id, i.seller_id FROM item_comments c \
         JOIN market_items i ON i.id = c.item_id \
         WHERE c.id = $1",
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;

    let (item_id, author_id, seller_id) = row.ok_or_else(|| ServiceError::not_found("Comment not found"))?;
    if actor.id != author_id && actor.id != seller_id && !actor.role.is_staff() {
        return Err(ServiceError::forbidden(
            "only the author, the seller or staff may delete this comment",
        ));
    }

    sqlx::query("DELETE FROM item_comments WHERE id = $1")
        .bind(comment_id)
        .execute(pool)
        .await?;

    tracing::info!(comment_id, item_id, actor_id = actor.id, "comment deleted");
    Ok(())
}

async fn fetch_comment(pool: &PgPool, comment_id: i64) -> Result<ItemComment, ServiceError> {
    sqlx::query_as::<_, ItemComment>(&format!("{COMMENT_SELECT} WHERE c.id = $1"))
        .bind(comment_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment not found"))
}
