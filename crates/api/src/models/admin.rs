use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{like_pattern, non_empty, Page};

#[derive(Debug, Clone, Default, Serialize, ToSchema, sqlx::FromRow)]
pub struct DashboardStats {
    pub users_total: i64,
    pub users_active: i64,
    pub users_new_last_7_days: i64,
    pub items_total: i64,
    pub items_available: i64,
    pub comments_total: i64,
    pub rides_total: i64,
    pub rides_open: i64,
    pub groups_total: i64,
    pub direct_messages_total: i64,
    pub group_messages_total: i64,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminUserQuery {
    /// Matches email, username or display name.
    pub q: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl AdminUserQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }

    pub fn pattern(&self) -> Option<String> {
        like_pattern(self.q.as_deref())
    }

    pub fn role(&self) -> Option<String> {
        non_empty(self.role.as_deref())
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminUpdateUserRequest {
    /// One of `user`, `moderator`, `admin`.
    pub role: Option<String>,
    pub is_active: Option<bool>,
}
