//! Ride sharing. Seat counts only change inside a transaction holding a row
//! lock on the ride, so concurrent joins can never overbook.

use campus_auth::User;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use super::ensure_can_manage;
use super::error::{optional_text, require_text, ServiceError};
use super::notifications::create_notification;
use crate::models::carpool::{
    CreateRideRequest, Ride, RideFilter, RidePassenger, UpdateRideRequest, RIDE_STATUSES,
};
use crate::models::notification::{NewNotification, NotificationKind};
use crate::models::Page;

pub const MAX_SEATS: i32 = 10;

const RIDE_SELECT: &str = "SELECT r.id, r.driver_id, u.username AS driver_username, \
     u.display_name AS driver_display_name, r.origin, r.destination, r.departure_time, \
     r.seats_total, r.seats_available, r.price_cents, r.notes, r.status, \
     r.created_at, r.updated_at \
     FROM rides r JOIN users u ON u.id = r.driver_id";

const RIDE_FILTER: &str = "WHERE ($1::text IS NULL OR r.origin ILIKE $1) \
     AND ($2::text IS NULL OR r.destination ILIKE $2) \
     AND ($3::timestamptz IS NULL OR r.departure_time >= $3) \
     AND ($4::timestamptz IS NULL OR r.departure_time <= $4) \
     AND ($5::text IS NULL OR r.status = $5)";

/// Locked view of the columns the seat logic needs.
#[derive(Debug, sqlx::FromRow)]
struct RideLock {
    driver_id: i64,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    seats_total: i32,
    seats_available: i32,
    status: String,
}

impl RideLock {
    fn route(&self) -> String {
        format!("{} → {}", self.origin, self.destination)
    }

    fn is_closed(&self) -> bool {
        matches!(self.status.as_str(), "cancelled" | "completed")
    }
}

pub async fn list_rides(
    pool: &PgPool,
    filter: &RideFilter,
    page: Page,
) -> Result<(Vec<Ride>, i64), ServiceError> {
    if let Some(status) = filter.status.as_deref() {
        if !RIDE_STATUSES.contains(&status) {
            return Err(ServiceError::bad_request(format!(
                "status must be one of: {}",
                RIDE_STATUSES.join(", ")
            )));
        }
    }

    let rides = sqlx::query_as::<_, Ride>(&format!(
        "{RIDE_SELECT} {RIDE_FILTER} ORDER BY r.departure_time ASC, r.id ASC LIMIT $6 OFFSET $7"
    ))
    .bind(&filter.origin)
    .bind(&filter.destination)
    .bind(filter.departure_after)
    .bind(filter.departure_before)
    .bind(&filter.status)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM rides r {RIDE_FILTER}"))
        .bind(&filter.origin)
        .bind(&filter.destination)
        .bind(filter.departure_after)
        .bind(filter.departure_before)
        .bind(&filter.status)
        .fetch_one(pool)
        .await?;

    Ok((rides, total))
}

pub async fn create_ride(
    pool: &PgPool,
    driver: &User,
    req: CreateRideRequest,
) -> Result<Ride, ServiceError> {
    let origin = require_text("origin", &req.origin, 200)?;
    let destination = require_text("destination", &req.destination, 200)?;
    let notes = optional_text("notes", req.notes.as_deref(), 1000)?;
    validate_departure(req.departure_time)?;
    validate_seats(req.seats_total)?;
    validate_price(req.price_cents)?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO rides \
             (driver_id, origin, destination, departure_time, seats_total, seats_available, price_cents, notes) \
         VALUES ($1, $2, $3, $4, $5, $5, $6, $7) RETURNING id",
    )
    .bind(driver.id)
    .bind(&origin)
    .bind(&destination)
    .bind(req.departure_time)
    .bind(req.seats_total)
    .bind(req.price_cents)
    .bind(&notes)
    .fetch_one(pool)
    .await?;

    tracing::info!(ride_id = id, driver_id = driver.id, "ride offered");
    get_ride(pool, id).await
}

pub async fn get_ride(pool: &PgPool, ride_id: i64) -> Result<Ride, ServiceError> {
    sqlx::query_as::<_, Ride>(&format!("{RIDE_SELECT} WHERE r.id = $1"))
        .bind(ride_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Ride not found"))
}

/// Edit a ride. Shrinking `seats_total` below the seats already booked is
/// rejected; availability and the open/full status are recomputed.
pub async fn update_ride(
    pool: &PgPool,
    actor: &User,
    ride_id: i64,
    req: UpdateRideRequest,
) -> Result<Ride, ServiceError> {
    let origin = req
        .origin
        .as_deref()
        .map(|origin| require_text("origin", origin, 200))
        .transpose()?;
    let destination = req
        .destination
        .as_deref()
        .map(|destination| require_text("destination", destination, 200))
        .transpose()?;
    let notes = optional_text("notes", req.notes.as_deref(), 1000)?;
    if let Some(departure) = req.departure_time {
        validate_departure(departure)?;
    }
    if let Some(price) = req.price_cents {
        validate_price(price)?;
    }

    let mut tx = pool.begin().await?;
    let ride = lock_ride(&mut tx, ride_id).await?;
    ensure_can_manage(actor, ride.driver_id, "ride")?;
    if ride.is_closed() {
        return Err(ServiceError::conflict(format!(
            "ride is {} and can no longer be edited",
            ride.status
        )));
    }

    let booked = ride.seats_total - ride.seats_available;
    let seats_total = match req.seats_total {
        Some(total) => {
            validate_seats(total)?;
            if total < booked {
                return Err(ServiceError::conflict(format!(
                    "{booked} seats are already booked"
                )));
            }
            total
        }
        None => ride.seats_total,
    };
    let seats_available = seats_total - booked;
    let status = if seats_available == 0 { "full" } else { "open" };

    sqlx::query(
        "UPDATE rides SET \
             origin = COALESCE($2, origin), \
             destination = COALESCE($3, destination), \
             departure_time = COALESCE($4, departure_time), \
             price_cents = COALESCE($5, price_cents), \
             notes = COALESCE($6, notes), \
             seats_total = $7, \
             seats_available = $8, \
             status = $9, \
             updated_at = now() \
         WHERE id = $1",
    )
    .bind(ride_id)
    .bind(origin)
    .bind(destination)
    .bind(req.departure_time)
    .bind(req.price_cents)
    .bind(notes)
    .bind(seats_total)
    .bind(seats_available)
    .bind(status)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(ride_id, actor_id = actor.id, "ride updated");
    get_ride(pool, ride_id).await
}

pub async fn cancel_ride(pool: &PgPool, actor: &User, ride_id: i64) -> Result<Ride, ServiceError> {
    let mut tx = pool.begin().await?;
    let ride = lock_ride(&mut tx, ride_id).await?;
    ensure_can_manage(actor, ride.driver_id, "ride")?;
    if ride.is_closed() {
        return Err(ServiceError::conflict(format!("ride is already {}", ride.status)));
    }

    sqlx::query("UPDATE rides SET status = 'cancelled', updated_at = now() WHERE id = $1")
        .bind(ride_id)
        .execute(&mut *tx)
        .await?;

    let passengers: Vec<i64> =
        sqlx::query_scalar("SELECT passenger_id FROM ride_passengers WHERE ride_id = $1")
            .bind(ride_id)
            .fetch_all(&mut *tx)
            .await?;

    for passenger_id in &passengers {
        create_notification(
            &mut *tx,
            &NewNotification {
                user_id: *passenger_id,
                kind: NotificationKind::RideCancelled,
                title: "A ride you joined was cancelled".into(),
                body: format!(
                    "{} on {}",
                    ride.route(),
                    ride.departure_time.format("%Y-%m-%d %H:%M UTC")
                ),
                related: Some(("ride", ride_id)),
            },
        )
        .await?;
    }

    tx.commit().await?;
    tracing::info!(
        ride_id,
        actor_id = actor.id,
        passengers = passengers.len(),
        "ride cancelled"
    );
    get_ride(pool, ride_id).await
}

/// Reserve `seats` (default 1) on a ride for `passenger`.
pub async fn join_ride(
    pool: &PgPool,
    passenger: &User,
    ride_id: i64,
    seats: Option<i32>,
) -> Result<Ride, ServiceError> {
    let seats = seats.unwrap_or(1);
    if !(1..=MAX_SEATS).contains(&seats) {
        return Err(ServiceError::bad_request(format!(
            "seats must be between 1 and {MAX_SEATS}"
        )));
    }

    let mut tx = pool.begin().await?;
    let ride = lock_ride(&mut tx, ride_id).await?;

    if ride.driver_id == passenger.id {
        return Err(ServiceError::bad_request("drivers cannot join their own ride"));
    }
    if ride.is_closed() {
        return Err(ServiceError::conflict(format!("ride is {}", ride.status)));
    }
    if ride.departure_time <= Utc::now() {
        return Err(ServiceError::conflict("ride has already departed"));
    }

    let already_joined: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM ride_passengers WHERE ride_id = $1 AND passenger_id = $2)",
    )
    .bind(ride_id)
    .bind(passenger.id)
    .fetch_one(&mut *tx)
    .await?;
    if already_joined {
        return Err(ServiceError::conflict("already joined this ride"));
    }

    if ride.seats_available == 0 {
        return Err(ServiceError::conflict("ride is full"));
    }
    if ride.seats_available < seats {
        return Err(ServiceError::conflict(format!(
            "only {} seats left",
            ride.seats_available
        )));
    }

    sqlx::query("INSERT INTO ride_passengers (ride_id, passenger_id, seats) VALUES ($1, $2, $3)")
        .bind(ride_id)
        .bind(passenger.id)
        .bind(seats)
        .execute(&mut *tx)
        .await?;

    let remaining = ride.seats_available - seats;
    set_availability(&mut tx, ride_id, remaining, status_after(&ride.status, remaining)).await?;

    create_notification(
        &mut *tx,
        &NewNotification {
            user_id: ride.driver_id,
            kind: NotificationKind::RideJoined,
            title: format!("{} joined your ride", passenger.display_name),
            body: format!("{} ({} seat(s), {} left)", ride.route(), seats, remaining),
            related: Some(("ride", ride_id)),
        },
    )
    .await?;

    tx.commit().await?;
    tracing::info!(ride_id, passenger_id = passenger.id, seats, remaining, "ride joined");
    get_ride(pool, ride_id).await
}

pub async fn leave_ride(pool: &PgPool, passenger: &User, ride_id: i64) -> Result<Ride, ServiceError> {
    let mut tx = pool.begin().await?;
    let ride = lock_ride(&mut tx, ride_id).await?;

    let seats: i32 = sqlx::query_scalar(
        "DELETE FROM ride_passengers WHERE ride_id = $1 AND passenger_id = $2 RETURNING seats",
    )
    .bind(ride_id)
    .bind(passenger.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ServiceError::not_found("not a passenger of this ride"))?;

    let remaining = (ride.seats_available + seats).min(ride.seats_total);
    set_availability(&mut tx, ride_id, remaining, status_after(&ride.status, remaining)).await?;

    create_notification(
        &mut *tx,
        &NewNotification {
            user_id: ride.driver_id,
            kind: NotificationKind::RideLeft,
            title: format!("{} left your ride", passenger.display_name),
            body: format!("{} ({} seat(s) freed)", ride.route(), seats),
            related: Some(("ride", ride_id)),
        },
    )
    .await?;

    tx.commit().await?;
    tracing::info!(ride_id, passenger_id = passenger.id, seats, "ride left");
    get_ride(pool, ride_id).await
}

pub async fn list_passengers(pool: &PgPool, ride_id: i64) -> Result<Vec<RidePassenger>, ServiceError> {
    get_ride(pool, ride_id).await?;

    let passengers = sqlx::query_as::<_, RidePassenger>(
        "SELECT p.passenger_id AS user_id, u.username, u.display_name, u.avatar_url, \
                p.seats, p.joined_at \
         FROM ride_passengers p JOIN users u ON u.id = p.passenger_id \
         WHERE p.ride_id = $1 ORDER BY p.joined_at ASC",
    )
    .bind(ride_id)
    .fetch_all(pool)
    .await?;

    Ok(passengers)
}

async fn lock_ride(conn: &mut PgConnection, ride_id: i64) -> Result<RideLock, ServiceError> {
    sqlx::query_as::<_, RideLock>(
        "SELECT driver_id, origin, destination, departure_time, seats_total, seats_available, status \
         FROM rides WHERE id = $1 FOR UPDATE",
    )
    .bind(ride_id)
    .fetch_optional(conn)
    .await?
    .ok_or_else(|| ServiceError::not_found("Ride not found"))
}

async fn set_availability(
    conn: &mut PgConnection,
    ride_id: i64,
    seats_available: i32,
    status: &str,
) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE rides SET seats_available = $2, status = $3, updated_at = now() WHERE id = $1",
    )
    .bind(ride_id)
    .bind(seats_available)
    .bind(status)
    .execute(conn)
    .await?;
    Ok(())
}

/// Open and full flip with availability; closed rides keep their status.
fn status_after(current: &str, seats_available: i32) -> &str {
    match current {
        "open" | "full" if seats_available == 0 => "full",
        "open" | "full" => "open",
        other => other,
    }
}

fn validate_departure(departure: DateTime<Utc>) -> Result<(), ServiceError> {
    if departure <= Utc::now() {
        return Err(ServiceError::bad_request("departure_time must be in the future"));
    }
    Ok(())
}

fn validate_seats(seats_total: i32) -> Result<(), ServiceError> {
    if !(1..=MAX_SEATS).contains(&seats_total) {
        return Err(ServiceError::bad_request(format!(
            "seats_total must be between 1 and {MAX_SEATS}"
        )));
    }
    Ok(())
}

fn validate_price(price_cents: i64) -> Result<(), ServiceError> {
    if price_cents < 0 {
        return Err(ServiceError::bad_request("price_cents must not be negative"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn status_follows_availability() {
        assert_eq!(status_after("open", 0), "full");
        assert_eq!(status_after("full", 2), "open");
        assert_eq!(status_after("open", 3), "open");
        assert_eq!(status_after("cancelled", 0), "cancelled");
    }

    #[test]
    fn departure_must_be_in_the_future() {
        assert!(validate_departure(Utc::now() + Duration::hours(1)).is_ok());
        assert!(validate_departure(Utc::now() - Duration::minutes(1)).is_err());
    }

    #[test]
    fn seat_bounds() {
        assert!(validate_seats(1).is_ok());
        assert!(validate_seats(MAX_SEATS).is_ok());
        assert!(validate_seats(0).is_err());
        assert!(validate_seats(MAX_SEATS + 1).is_err());
    }
}
