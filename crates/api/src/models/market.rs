use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::{IntoParams, ToSchema};

use super::common::{like_pattern, non_empty, Page};

pub const ITEM_STATUSES: &[&str] = &["available", "reserved", "sold"];

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct MarketItem {
    pub id: i64,
    pub seller_id: i64,
    pub seller_username: String,
    pub seller_display_name: String,
    pub title: String,
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub condition: Option<String>,
    pub status: String,
    pub location: Option<String>,
    #[schema(value_type = Vec<String>)]
    pub image_urls: Json<Vec<String>>,
    pub view_count: i64,
    pub comment_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub price_cents: i64,
    pub condition: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_cents: Option<i64>,
    pub condition: Option<String>,
    pub location: Option<String>,
    pub image_urls: Option<Vec<String>>,
    /// One of `available`, `reserved`, `sold`.
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ItemListQuery {
    pub category: Option<String>,
    pub status: Option<String>,
    /// Case-insensitive match on title and description.
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub seller_id: Option<i64>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Normalised listing filter bound straight into SQL.
#[derive(Debug, Default, Clone)]
pub struct ItemFilter {
    pub category: Option<String>,
    pub status: Option<String>,
    pub pattern: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub seller_id: Option<i64>,
}

impl ItemListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }

    pub fn filter(&self) -> ItemFilter {
        ItemFilter {
            category: non_empty(self.category.as_deref()),
            status: non_empty(self.status.as_deref()),
            pattern: like_pattern(self.q.as_deref()),
            min_price: self.min_price,
            max_price: self.max_price,
            seller_id: self.seller_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct ItemComment {
    pub id: i64,
    pub item_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub author_display_name: String,
    pub author_avatar_url: Option<String>,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Comment being replied to; must belong to the same item.
    pub parent_id: Option<i64>,
}
