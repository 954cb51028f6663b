//! Domain logic behind the HTTP handlers. Every function takes the pool (or a
//! transaction) explicitly and returns [`ServiceError`].

pub mod admin;
pub mod carpool;
pub mod comments;
pub mod error;
pub mod groups;
pub mod market;
pub mod messaging;
pub mod notifications;
pub mod users;

use campus_auth::User;

pub use error::ServiceError;

/// Owners manage their own records; moderators and admins manage everyone's.
pub(crate) fn ensure_can_manage(actor: &User, owner_id: i64, what: &str) -> Result<(), ServiceError> {
    if actor.id == owner_id || actor.role.is_staff() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "only the owner or staff may modify this {what}"
        )))
    }
}
