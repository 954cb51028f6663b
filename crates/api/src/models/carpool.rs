use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common::{like_pattern, non_empty, Page};

pub const RIDE_STATUSES: &[&str] = &["open", "full", "cancelled", "completed"];

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct Ride {
    pub id: i64,
    pub driver_id: i64,
    pub driver_username: String,
    pub driver_display_name: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats_total: i32,
    pub seats_available: i32,
    pub price_cents: i64,
    pub notes: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRideRequest {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats_total: i32,
    #[serde(default)]
    pub price_cents: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRideRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_time: Option<DateTime<Utc>>,
    pub seats_total: Option<i32>,
    pub price_cents: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct JoinRideRequest {
    /// Seats to reserve (default 1).
    pub seats: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RideListQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_after: Option<DateTime<Utc>>,
    pub departure_before: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Default, Clone)]
pub struct RideFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_after: Option<DateTime<Utc>>,
    pub departure_before: Option<DateTime<Utc>>,
    pub status: Option<String>,
}

impl RideListQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }

    pub fn filter(&self) -> RideFilter {
        RideFilter {
            origin: like_pattern(self.origin.as_deref()),
            destination: like_pattern(self.destination.as_deref()),
            departure_after: self.departure_after,
            departure_before: self.departure_before,
            status: non_empty(self.status.as_deref()),
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema, sqlx::FromRow)]
pub struct RidePassenger {
    pub user_id: i64,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub seats: i32,
    pub joined_at: DateTime<Utc>,
}
