use campus_auth::{validation, User};
use sqlx::types::Json;
use sqlx::PgPool;

use super::ensure_can_manage;
use super::error::{optional_text, require_text, ServiceError};
use crate::models::market::{
    CreateItemRequest, ItemFilter, MarketItem, UpdateItemRequest, ITEM_STATUSES,
};
use crate::models::Page;

const MAX_IMAGES: usize = 9;

pub(crate) const ITEM_SELECT: &str = "SELECT i.id, i.seller_id, u.username AS seller_username, \
     u.display_name AS seller_display_name, i.title, i.description, i.category, i.price_cents, \
     i.condition, i.status, i.location, i.image_urls, i.view_count, \
     (SELECT COUNT(*) FROM item_comments c WHERE c.item_id = i.id) AS comment_count, \
     i.created_at, i.updated_at \
     FROM market_items i JOIN users u ON u.id = i.seller_id";

const ITEM_FILTER: &str = "WHERE ($1::text IS NULL OR i.category = $1) \
     AND ($2::text IS NULL OR i.status = $2) \
     AND ($3::text IS NULL OR i.title ILIKE $3 OR i.description ILIKE $3) \
     AND ($4::bigint IS NULL OR i.price_cents >= $4) \
     AND ($5::bigint IS NULL OR i.price_cents <= $5) \
     AND ($6::bigint IS NULL OR i.seller_id = $6)";

pub async fn list_items(
    pool: &PgPool,
    filter: &ItemFilter,
    page: Page,
) -> Result<(Vec<MarketItem>, i64), ServiceError> {
    if let Some(status) = filter.status.as_deref() {
        validate_status(status)?;
    }

    let items = sqlx::query_as::<_, MarketItem>(&format!(
        "{ITEM_SELECT} {ITEM_FILTER} ORDER BY i.created_at DESC, i.id DESC LIMIT $7 OFFSET $8"
    ))
    .bind(&filter.category)
    .bind(&filter.status)
    .bind(&filter.pattern)
    .bind(filter.min_price)
    .bind(filter.max_price)
    .bind(filter.seller_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM market_items i {ITEM_FILTER}"
    ))
    .bind(&filter.category)
    .bind(&filter.status)
    .bind(&filter.pattern)
    .bind(filter.min_price)
    .bind(filter.max_price)
    .bind(filter.seller_id)
    .fetch_one(pool)
    .await?;

    Ok((items, total))
}

pub async fn create_item(
    pool: &PgPool,
    seller: &User,
    req: CreateItemRequest,
) -> Result<MarketItem, ServiceError> {
    let title = require_text("title", &req.title, 100)?;
    let category = require_text("category", &req.category, 50)?;
    let description = optional_text("description", Some(&req.description), 5000)?.unwrap_or_default();
    let condition = optional_text("condition", req.condition.as_deref(), 50)?;
    let location = optional_text("location", req.location.as_deref(), 100)?;
    validate_price(req.price_cents)?;
    let image_urls = validate_images(req.image_urls)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO market_items \
             (seller_id, title, description, category, price_cents, condition, location, image_urls) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING id",
    )
    .bind(seller.id)
    .bind(&title)
    .bind(&description)
    .bind(&category)
    .bind(req.price_cents)
    .bind(&condition)
    .bind(&location)
    .bind(Json(&image_urls))
    .fetch_one(pool)
    .await?;

    tracing::info!(item_id = id, seller_id = seller.id, "market item listed");
    fetch_item(pool, id).await
}

/// Fetch an item and count the view.
pub async fn view_item(pool: &PgPool, item_id: i64) -> Result<MarketItem, ServiceError> {
    let updated = sqlx::query("UPDATE market_items SET view_count = view_count + 1 WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(ServiceError::not_found("Item not found"));
    }

    fetch_item(pool, item_id).await
}

pub async fn fetch_item(pool: &PgPool, item_id: i64) -> Result<MarketItem, ServiceError> {
    sqlx::query_as::<_, MarketItem>(&format!("{ITEM_SELECT} WHERE i.id = $1"))
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Item not found"))
}

pub async fn update_item(
    pool: &PgPool,
    actor: &User,
    item_id: i64,
    req: UpdateItemRequest,
) -> Result<MarketItem, ServiceError> {
    let seller_id = item_seller(pool, item_id).await?;
    ensure_can_manage(actor, seller_id, "item")?;

    let title = req
        .title
        .as_deref()
        .map(|title| require_text("title", title, 100))
        .transpose()?;
    let category = req
        .category
        .as_deref()
        .map(|category| require_text("category", category, 50))
        .transpose()?;
    let description = req
        .description
        .as_deref()
        .map(|description| optional_text("description", Some(description), 5000))
        .transpose()?
        .map(Option::unwrap_or_default);
    let condition = optional_text("condition", req.condition.as_deref(), 50)?;
    let location = optional_text("location", req.location.as_deref(), 100)?;
    if let Some(price) = req.price_cents {
        validate_price(price)?;
    }
    if let Some(status) = req.status.as_deref() {
        validate_status(status)?;
    }
    let image_urls = req.image_urls.map(validate_images).transpose()?;

    sqlx::query(
        "UPDATE market_items SET \
             title = COALESCE($2, title), \
             description = COALESCE($3, description), \
             category = COALESCE($4, category), \
             price_cents = COALESCE($5, price_cents), \
             condition = COALESCE($6, condition), \
             location = COALESCE($7, location), \
             image_urls = COALESCE($8, image_urls), \
             status = COALESCE($9, status), \
             updated_at = now() \
         WHERE id = $1",
    )
    .bind(item_id)
    .bind(title)
    .bind(description)
    .bind(category)
    .bind(req.price_cents)
    .bind(condition)
    .bind(location)
    .bind(image_urls.map(Json))
    .bind(req.status)
    .execute(pool)
    .await?;

    tracing::info!(item_id, actor_id = actor.id, "market item updated");
    fetch_item(pool, item_id).await
}

pub async fn delete_item(pool: &PgPool, actor: &User, item_id: i64) -> Result<(), ServiceError> {
    let seller_id = item_seller(pool, item_id).await?;
    ensure_can_manage(actor, seller_id, "item")?;

    sqlx::query("DELETE FROM market_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;

    tracing::info!(item_id, actor_id = actor.id, "market item deleted");
    Ok(())
}

pub(crate) async fn item_seller(pool: &PgPool, item_id: i64) -> Result<i64, ServiceError> {
    sqlx::query_scalar("SELECT seller_id FROM market_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Item not found"))
}

fn validate_price(price_cents: i64) -> Result<(), ServiceError> {
    if price_cents < 0 {
        return Err(ServiceError::bad_request("price_cents must not be negative"));
    }
    Ok(())
}

fn validate_status(status: &str) -> Result<(), ServiceError> {
    if ITEM_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(ServiceError::bad_request(format!(
            "status must be one of: {}",
            ITEM_STATUSES.join(", ")
        )))
    }
}

fn validate_images(urls: Vec<String>) -> Result<Vec<String>, ServiceError> {
    if urls.len() > MAX_IMAGES {
        return Err(ServiceError::bad_request(format!(
            "at most {MAX_IMAGES} images are allowed"
        )));
    }

    let mut cleaned = Vec::with_capacity(urls.len());
    for url in urls {
        let url = url.trim().to_string();
        if url.is_empty() {
            continue;
        }
        validation::validate_url(&url)?;
        cleaned.push(url);
    }
    Ok(cleaned)
}
