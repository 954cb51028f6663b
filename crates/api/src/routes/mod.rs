pub mod admin;
pub mod auth;
pub mod conversations;
pub mod groups;
pub mod health;
pub mod market;
pub mod notifications;
pub mod rides;
pub mod users;

use crate::ApiError;

/// Fallback for unknown paths, rendered with the usual error envelope.
pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
