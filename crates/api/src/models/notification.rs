use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::Page;

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: String,
    pub title: String,
    pub body: String,
    pub related_entity_type: Option<String>,
    pub related_entity_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ItemComment,
    CommentReply,
    RideJoined,
    RideLeft,
    RideCancelled,
    DirectMessage,
    GroupJoined,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::ItemComment => "item_comment",
            NotificationKind::CommentReply => "comment_reply",
            NotificationKind::RideJoined => "ride_joined",
            NotificationKind::RideLeft => "ride_left",
            NotificationKind::RideCancelled => "ride_cancelled",
            NotificationKind::DirectMessage => "direct_message",
            NotificationKind::GroupJoined => "group_joined",
        }
    }
}

/// A notification about to be stored.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub related: Option<(&'static str, i64)>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListQuery {
    /// Only return unread notifications.
    pub unread_only: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl NotificationListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}
