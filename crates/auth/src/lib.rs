//! Accounts and authentication for Campus Hub.
//!
//! [`Authenticator`] owns registration, login, email verification and token
//! validation. Tokens are stateless HS256 JWTs; every authenticated request
//! still reloads the user so deactivation takes effect immediately.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use campus_config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod jwt;
pub mod mailer;
pub mod password;
pub mod validation;

pub use jwt::{Claims, JwtManager, TokenError};
pub use mailer::{mailer_from_config, HttpMailer, LogMailer, MailError, MailMessage, Mailer};

/// Column list matching [`User`]'s `FromRow` layout.
pub const USER_COLUMNS: &str = "id, email, username, display_name, avatar_url, bio, role, \
     is_active, email_verified, created_at, updated_at, last_login_at";

/// Wrong guesses a verification code survives before it is retired.
pub const MAX_VERIFICATION_ATTEMPTS: i32 = 5;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account is disabled")]
    AccountDisabled,
    #[error("email address has not been verified")]
    EmailNotVerified,
    #[error("invalid or expired verification code")]
    InvalidVerificationCode,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("user not found")]
    UserNotFound,
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("token creation failed: {0}")]
    TokenCreation(#[source] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Encode(source) => AuthError::TokenCreation(source),
            TokenError::Invalid(_) => AuthError::InvalidToken,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Moderators and admins may act on content they do not own.
    pub fn is_staff(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterInput {
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Clone)]
pub struct Authenticator {
    pool: PgPool,
    jwt: Arc<JwtManager>,
    mailer: Arc<dyn Mailer>,
    verification_ttl: Duration,
    require_verified_email: bool,
}

impl Authenticator {
    pub fn new(pool: PgPool, config: &AuthConfig, mailer: Arc<dyn Mailer>) -> Self {
        let jwt = JwtManager::new(&config.jwt_secret, config.issuer.clone(), config.audience.clone())
            .with_ttl(duration_from_secs(config.token_ttl_seconds));

        Self {
            pool,
            jwt: Arc::new(jwt),
            mailer,
            verification_ttl: duration_from_secs(config.verification_code_ttl_seconds),
            require_verified_email: config.require_verified_email,
        }
    }

    /// Create an account and send its first verification code.
    pub async fn register(&self, input: RegisterInput) -> Result<User, AuthError> {
        let email = normalize_email(&input.email);
        let username = input.username.trim().to_string();
        let display_name = input
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(username.as_str())
            .to_string();

        validation::validate_email(&email)?;
        validation::validate_username(&username)?;
        validation::validate_password(&input.password)?;
        validation::validate_display_name(&display_name)?;

        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM users WHERE email = $1 OR lower(username) = lower($2) LIMIT 1",
        )
        .bind(&email)
        .bind(&username)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = password::hash_password(&input.password)?;

        let user: User = sqlx::query_as(&format!(
            "INSERT INTO users (email, username, display_name, password_hash) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&email)
        .bind(&username)
        .bind(&display_name)
        .bind(&password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        let code = self.store_verification_code(&mut tx, user.id).await?;
        tx.commit().await?;

        info!(user_id = user.id, username = %user.username, "registered user");

        // The account exists either way; the code can be re-sent later.
        if let Err(err) = self.send_verification(&user.email, &code).await {
            warn!(user_id = user.id, error = %err, "failed to send verification email");
        }

        Ok(user)
    }

    /// Log in with an email address or username.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<AuthSession, AuthError> {
        let identifier = identifier.trim();
        let row: Option<(i64, String)> = sqlx::query_as(
            "SELECT id, password_hash FROM users \
             WHERE email = lower($1) OR lower(username) = lower($1) LIMIT 1",
        )
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        let Some((user_id, password_hash)) = row else {
            debug!("login attempt for unknown account");
            return Err(AuthError::InvalidCredentials);
        };

        if !password::verify_password(password, &password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let user = self.fetch_user(user_id).await?;
        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }
        if self.require_verified_email && !user.email_verified {
            return Err(AuthError::EmailNotVerified);
        }

        let user: User = sqlx::query_as(&format!(
            "UPDATE users SET last_login_at = now() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        info!(user_id, "user logged in");
        self.issue_session(user)
    }

    /// Issue a fresh token for an already authenticated user.
    pub fn issue_session(&self, user: User) -> Result<AuthSession, AuthError> {
        let (token, expires_at) = self.jwt.issue(user.id, user.role.as_str())?;
        Ok(AuthSession {
            token,
            user,
            expires_at,
        })
    }

    /// Consume a verification code and mark the email as verified.
    pub async fn verify_email(&self, email: &str, code: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let code = code.trim();

        let mut tx = self.pool.begin().await?;

        let user: Option<User> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
                .bind(&email)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(user) = user else {
            return Err(AuthError::InvalidVerificationCode);
        };

        if user.email_verified {
            return Ok(user);
        }

        let consumed: Option<i64> = sqlx::query_scalar(
            "UPDATE email_verifications SET consumed_at = now() \
             WHERE id = ( \
                 SELECT id FROM email_verifications \
                 WHERE user_id = $1 AND code = $2 AND consumed_at IS NULL AND expires_at > now() \
                 ORDER BY created_at DESC LIMIT 1 \
             ) RETURNING id",
        )
        .bind(user.id)
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        if consumed.is_none() {
            // Keep the failed attempt even though the verification failed.
            self.record_failed_attempt(&mut tx, user.id).await?;
            tx.commit().await?;
            return Err(AuthError::InvalidVerificationCode);
        }

        let user: User = sqlx::query_as(&format!(
            "UPDATE users SET email_verified = TRUE, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(user_id = user.id, "email verified");
        Ok(user)
    }

    /// Send a new code. Unknown or already verified addresses succeed silently.
    pub async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        let row: Option<(i64, bool)> =
            sqlx::query_as("SELECT id, email_verified FROM users WHERE email = $1")
                .bind(&email)
                .fetch_optional(&self.pool)
                .await?;

        let Some((user_id, false)) = row else {
            debug!("verification resend skipped");
            return Ok(());
        };

        let mut tx = self.pool.begin().await?;
        let code = self.store_verification_code(&mut tx, user_id).await?;
        tx.commit().await?;

        self.send_verification(&email, &code).await?;
        info!(user_id, "verification code re-sent");
        Ok(())
    }

    /// Validate a bearer token and load the user it belongs to.
    pub async fn authenticate_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.validate(token)?;
        let user_id = claims.user_id().ok_or(AuthError::InvalidToken)?;

        let user = match self.fetch_user(user_id).await {
            Ok(user) => user,
            Err(AuthError::UserNotFound) => return Err(AuthError::InvalidToken),
            Err(err) => return Err(err),
        };

        if !user.is_active {
            return Err(AuthError::AccountDisabled);
        }

        Ok(user)
    }

    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validation::validate_password(new_password)?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        let stored = stored.ok_or(AuthError::UserNotFound)?;
        if !password::verify_password(current_password, &stored)? {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = password::hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
            .bind(new_hash)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id, "password changed");
        Ok(())
    }

    pub async fn fetch_user(&self, user_id: i64) -> Result<User, AuthError> {
        sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    async fn store_verification_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
    ) -> Result<String, AuthError> {
        let code = generate_verification_code();
        let expires_at = Utc::now() + self.verification_ttl;

        // Only the newest code stays live.
        sqlx::query(
            "UPDATE email_verifications SET consumed_at = now() \
             WHERE user_id = $1 AND consumed_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            "INSERT INTO email_verifications (user_id, code, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(&code)
        .bind(expires_at)
        .execute(&mut **tx)
        .await?;

        Ok(code)
    }

    async fn record_failed_attempt(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
    ) -> Result<(), AuthError> {
        let retired: Vec<bool> = sqlx::query_scalar(
            "UPDATE email_verifications \
             SET attempts = attempts + 1, \
                 consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END \
             WHERE user_id = $1 AND consumed_at IS NULL AND expires_at > now() \
             RETURNING consumed_at IS NOT NULL",
        )
        .bind(user_id)
        .bind(MAX_VERIFICATION_ATTEMPTS)
        .fetch_all(&mut **tx)
        .await?;

        if retired.into_iter().any(|retired| retired) {
            warn!(user_id, "verification code retired after too many failed attempts");
        }
        Ok(())
    }

    async fn send_verification(&self, email: &str, code: &str) -> Result<(), MailError> {
        let message =
            mailer::verification_message(email, code, self.verification_ttl.num_minutes());
        self.mailer.send(&message).await
    }
}

// Capped at roughly ten years so date arithmetic cannot overflow.
fn duration_from_secs(seconds: u64) -> Duration {
    const MAX_SECONDS: i64 = 10 * 365 * 86_400;
    Duration::seconds(i64::try_from(seconds).unwrap_or(MAX_SECONDS).min(MAX_SECONDS))
}

/// Emails are compared case-insensitively and stored lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Six random digits, zero padded.
pub fn generate_verification_code() -> String {
    let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{value:06}")
}

/// Postgres reports unique violations with SQLSTATE 23505.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

fn map_unique_violation(err: sqlx::Error) -> AuthError {
    if is_unique_violation(&err) {
        AuthError::UserExists
    } else {
        AuthError::Database(err)
    }
}
