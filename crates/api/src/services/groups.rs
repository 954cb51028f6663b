use campus_auth::User;
use sqlx::PgPool;

use super::ensure_can_manage;
use super::error::{optional_text, require_text, ServiceError};
use super::notifications::create_notification;
use crate::models::group::{
    CreateGroupRequest, Group, GroupDetail, GroupMember, GroupMessage, UpdateGroupRequest,
};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::Page;

const GROUP_SELECT: &str = "SELECT g.id, g.name, g.description, g.category, g.owner_id, \
     (SELECT COUNT(*) FROM group_members m WHERE m.group_id = g.id) AS member_count, \
     g.created_at, g.updated_at FROM groups g";

const GROUP_FILTER: &str = "WHERE ($1::text IS NULL OR g.name ILIKE $1 OR g.description ILIKE $1) \
     AND ($2::text IS NULL OR g.category = $2)";

const GROUP_MESSAGE_SELECT: &str = "SELECT m.id, m.group_id, m.sender_id, \
     u.username AS sender_username, u.display_name AS sender_display_name, \
     m.content, m.created_at \
     FROM group_messages m JOIN users u ON u.id = m.sender_id";

pub async fn list_groups(
    pool: &PgPool,
    pattern: Option<String>,
    category: Option<String>,
    page: Page,
) -> Result<(Vec<Group>, i64), ServiceError> {
    let groups = sqlx::query_as::<_, Group>(&format!(
        "{GROUP_SELECT} {GROUP_FILTER} ORDER BY g.created_at DESC, g.id DESC LIMIT $3 OFFSET $4"
    ))
    .bind(&pattern)
    .bind(&category)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM groups g {GROUP_FILTER}"))
        .bind(&pattern)
        .bind(&category)
        .fetch_one(pool)
        .await?;

    Ok((groups, total))
}

/// Create a group; the creator becomes its owner.
pub async fn create_group(
    pool: &PgPool,
    owner: &User,
    req: CreateGroupRequest,
) -> Result<GroupDetail, ServiceError> {
    let name = require_text("name", &req.name, 100)?;
    let description = optional_text("description", Some(&req.description), 2000)?.unwrap_or_default();
    let category = optional_text("category", req.category.as_deref(), 50)?;

    let mut tx = pool.begin().await?;

    let group_id: i64 = sqlx::query_scalar(
        "INSERT INTO groups (name, description, category, owner_id) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(&name)
    .bind(&description)
    .bind(&category)
    .bind(owner.id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| match ServiceError::from(err) {
        ServiceError::Conflict(_) => ServiceError::conflict("a group with this name already exists"),
        other => other,
    })?;

    sqlx::query("INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, 'owner')")
        .bind(group_id)
        .bind(owner.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(group_id, owner_id = owner.id, "group created");

    get_group(pool, group_id, Some(owner.id)).await
}

pub async fn get_group(
    pool: &PgPool,
    group_id: i64,
    viewer_id: Option<i64>,
) -> Result<GroupDetail, ServiceError> {
    let group = fetch_group(pool, group_id).await?;
    let viewer_role = match viewer_id {
        Some(user_id) => member_role(pool, group_id, user_id).await?,
        None => None,
    };
    Ok(GroupDetail { group, viewer_role })
}

pub async fn update_group(
    pool: &PgPool,
    actor: &User,
    group_id: i64,
    req: UpdateGroupRequest,
) -> Result<GroupDetail, ServiceError> {
    let group = fetch_group(pool, group_id).await?;
    ensure_can_manage(actor, group.owner_id, "group")?;

    let name = req
        .name
        .as_deref()
        .map(|name| require_text("name", name, 100))
        .transpose()?;
    let description = req
        .description
        .as_deref()
        .map(|description| optional_text("description", Some(description), 2000))
        .transpose()?
        .map(Option::unwrap_or_default);
    let category = optional_text("category", req.category.as_deref(), 50)?;

    sqlx::query(
        "UPDATE groups SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             category = COALESCE($4, category), \
             updated_at = now() \
         WHERE id = $1",
    )
    .bind(group_id)
    .bind(name)
    .bind(description)
    .bind(category)
    .execute(pool)
    .await
    .map_err(|err| match ServiceError::from(err) {
        ServiceError::Conflict(_) => ServiceError::conflict("a group with this name already exists"),
        other => other,
    })?;

    tracing::info!(group_id, actor_id = actor.id, "group updated");
    get_group(pool, group_id, Some(actor.id)).await
}

pub async fn delete_group(pool: &PgPool, actor: &User, group_id: i64) -> Result<(), ServiceError> {
    let group = fetch_group(pool, group_id).await?;
    ensure_can_manage(actor, group.owner_id, "group")?;

    sqlx::query("DELETE FROM groups WHERE id = $1")
        .bind(group_id)
        .execute(pool)
        .await?;

    tracing::info!(group_id, actor_id = actor.id, "group deleted");
    Ok(())
}

pub async fn join_group(pool: &PgPool, user: &User, group_id: i64) -> Result<GroupDetail, ServiceError> {
    let group = fetch_group(pool, group_id).await?;

    let mut tx = pool.begin().await?;
    let inserted = sqlx::query(
        "INSERT INTO group_members (group_id, user_id, role) VALUES ($1, $2, 'member') \
         ON CONFLICT (group_id, user_id) DO NOTHING",
    )
    .bind(group_id)
    .bind(user.id)
    .execute(&mut *tx)
    .await?;

    if inserted.rows_affected() == 0 {
        return Err(ServiceError::conflict("already a member of this group"));
    }

    create_notification(
        &mut *tx,
        &NewNotification {
            user_id: group.owner_id,
            kind: NotificationKind::GroupJoined,
            title: format!("{} joined {}", user.display_name, group.name),
            body: String::new(),
            related: Some(("group", group_id)),
        },
    )
    .await?;

    tx.commit().await?;
    tracing::info!(group_id, user_id = user.id, "group joined");
    get_group(pool, group_id, Some(user.id)).await
}

pub async fn leave_group(pool: &PgPool, user: &User, group_id: i64) -> Result<(), ServiceError> {
    let group = fetch_group(pool, group_id).await?;
    if group.owner_id == user.id {
        return Err(ServiceError::bad_request("the owner cannot leave their own group"));
    }

    let result = sqlx::query("DELETE FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user.id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("not a member of this group"));
    }

    tracing::info!(group_id, user_id = user.id, "group left");
    Ok(())
}

pub async fn list_members(
    pool: &PgPool,
    group_id: i64,
    page: Page,
) -> Result<(Vec<GroupMember>, i64), ServiceError> {
    fetch_group(pool, group_id).await?;

    let members = sqlx::query_as::<_, GroupMember>(
        "SELECT m.user_id, u.username, u.display_name, u.avatar_url, m.role, m.joined_at \
         FROM group_members m JOIN users u ON u.id = m.user_id \
         WHERE m.group_id = $1 \
         ORDER BY CASE m.role WHEN 'owner' THEN 0 WHEN 'admin' THEN 1 ELSE 2 END, m.joined_at ASC \
         LIMIT $2 OFFSET $3",
    )
    .bind(group_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_members WHERE group_id = $1")
        .bind(group_id)
        .fetch_one(pool)
        .await?;

    Ok((members, total))
}

/// Group chat history, newest first. Members and staff only.
pub async fn list_messages(
    pool: &PgPool,
    viewer: &User,
    group_id: i64,
    page: Page,
) -> Result<(Vec<GroupMessage>, i64), ServiceError> {
    fetch_group(pool, group_id).await?;
    if !viewer.role.is_staff() && member_role(pool, group_id, viewer.id).await?.is_none() {
        return Err(ServiceError::forbidden("only members can read group messages"));
    }

    let messages = sqlx::query_as::<_, GroupMessage>(&format!(
        "{GROUP_MESSAGE_SELECT} WHERE m.group_id = $1 \
         ORDER BY m.created_at DESC, m.id DESC LIMIT $2 OFFSET $3"
    ))
    .bind(group_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM group_messages WHERE group_id = $1")
        .bind(group_id)
        .fetch_one(pool)
        .await?;

    Ok((messages, total))
}

pub async fn post_message(
    pool: &PgPool,
    sender: &User,
    group_id: i64,
    content: &str,
) -> Result<GroupMessage, ServiceError> {
    let content = require_text("content", content, 2000)?;
    fetch_group(pool, group_id).await?;
    if member_role(pool, group_id, sender.id).await?.is_none() {
        return Err(ServiceError::forbidden("only members can post to this group"));
    }

    let message_id: i64 = sqlx::query_scalar(
        "INSERT INTO group_messages (group_id, sender_id, content) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(group_id)
    .bind(sender.id)
    .bind(&content)
    .fetch_one(pool)
    .await?;

    tracing::debug!(group_id, message_id, "group message posted");

    sqlx::query_as::<_, GroupMessage>(&format!("{GROUP_MESSAGE_SELECT} WHERE m.id = $1"))
        .bind(message_id)
        .fetch_one(pool)
        .await
        .map_err(ServiceError::from)
}

async fn fetch_group(pool: &PgPool, group_id: i64) -> Result<Group, ServiceError> {
    sqlx::query_as::<_, Group>(&format!("{GROUP_SELECT} WHERE g.id = $1"))
        .bind(group_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Group not found"))
}

async fn member_role(pool: &PgPool, group_id: i64, user_id: i64) -> Result<Option<String>, ServiceError> {
    let role = sqlx::query_scalar("SELECT role FROM group_members WHERE group_id = $1 AND user_id = $2")
        .bind(group_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(role)
}
