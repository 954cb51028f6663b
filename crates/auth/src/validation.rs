//! Input validation for account fields.

use regex::Regex;

use crate::AuthError;

fn invalid(message: &str) -> AuthError {
    AuthError::Validation(message.to_string())
}

/// Validate email format
pub fn validate_email(email: &str) -> Result<(), AuthError> {
    if email.len() > 255 {
        return Err(invalid("Email too long"));
    }

    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map_err(|_| invalid("Invalid email regex"))?;

    if !email_regex.is_match(email) {
        return Err(invalid("Invalid email format"));
    }

    Ok(())
}

/// Passwords need 8 to 128 characters with a lowercase letter, an uppercase
/// letter and a digit.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let length = password.chars().count();
    if length < 8 {
        return Err(invalid("Password must be at least 8 characters long"));
    }
    if length > 128 {
        return Err(invalid("Password must be at most 128 characters long"));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(invalid("Password must contain at least one lowercase letter"));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(invalid("Password must contain at least one uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid("Password must contain at least one digit"));
    }

    Ok(())
}

/// Validate username
pub fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.len() < 3 {
        return Err(invalid("Username must be at least 3 characters long"));
    }
    if username.len() > 30 {
        return Err(invalid("Username must be at most 30 characters long"));
    }

    let username_regex =
        Regex::new(r"^[a-zA-Z0-9_-]+$").map_err(|_| invalid("Invalid username regex"))?;

    if !username_regex.is_match(username) {
        return Err(invalid(
            "Username can only contain letters, numbers, underscores, and hyphens",
        ));
    }

    Ok(())
}

/// Validate display name
pub fn validate_display_name(display_name: &str) -> Result<(), AuthError> {
    if display_name.trim().is_empty() {
        return Err(invalid("Display name cannot be empty"));
    }
    if display_name.chars().count() > 50 {
        return Err(invalid("Display name must be at most 50 characters long"));
    }
    if display_name.chars().any(char::is_control) {
        return Err(invalid("Display name contains invalid characters"));
    }

    Ok(())
}

/// Validate an optional http(s) URL. Empty strings are accepted.
pub fn validate_url(url: &str) -> Result<(), AuthError> {
    if url.is_empty() {
        return Ok(());
    }
    if url.len() > 2048 {
        return Err(invalid("URL too long"));
    }

    let url_regex =
        Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").map_err(|_| invalid("Invalid URL regex"))?;

    if !url_regex.is_match(url) {
        return Err(invalid("Invalid URL format"));
    }

    Ok(())
}
