//! Stateless access tokens.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,  // user id
    pub exp: usize,   // expiration time
    pub iat: usize,   // issued at
    pub nbf: usize,   // not before
    pub iss: String,  // issuer
    pub aud: String,  // audience
    pub jti: String,  // token id
    pub role: String, // role at issue time
}

impl Claims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),
    #[error("token validation failed: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),
}

/// HS256 token issuer and validator.
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: Duration::hours(24),
        }
    }

    /// Override the default 24 hour lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for `user_id` and return it with its expiry.
    pub fn issue(&self, user_id: i64, role: &str) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;

        let claims = Claims {
            sub: user_id.to_string(),
            exp: to_timestamp(expires_at),
            iat: to_timestamp(now),
            nbf: to_timestamp(now),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
            role: role.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encode)?;

        Ok((token, expires_at))
    }

    /// Validate signature, issuer, audience and expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_nbf = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(TokenError::Invalid)?;

        Ok(data.claims)
    }
}

fn to_timestamp(at: DateTime<Utc>) -> usize {
    usize::try_from(at.timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test_secret_key_that_is_long_enough_for_hs256";

    fn manager() -> JwtManager {
        JwtManager::new(SECRET, "campus-test", "campus-test-users")
    }

    #[test]
    fn token_round_trips() {
        let jwt = manager();
        let (token, expires_at) = jwt.issue(42, "admin").unwrap();

        let claims = jwt.validate(&token).unwrap();
        assert_eq!(claims.user_id(), Some(42));
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.iss, "campus-test");
        assert_eq!(claims.aud, "campus-test-users");
        assert_eq!(claims.exp, to_timestamp(expires_at));
    }

    #[test]
    fn each_token_has_a_unique_id() {
        let jwt = manager();
        let (first, _) = jwt.issue(1, "user").unwrap();
        let (second, _) = jwt.issue(1, "user").unwrap();

        let first = jwt.validate(&first).unwrap();
        let second = jwt.validate(&second).unwrap();
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let jwt = manager().with_ttl(Duration::hours(-2));
        let (token, _) = jwt.issue(1, "user").unwrap();

        assert!(matches!(jwt.validate(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn wrong_audience_is_rejected() {
        let (token, _) = manager().issue(1, "user").unwrap();
        let other = JwtManager::new(SECRET, "campus-test", "someone-else");

        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (token, _) = manager().issue(1, "user").unwrap();
        let other = JwtManager::new(
            "a-different-secret-of-decent-length",
            "campus-test",
            "campus-test-users",
        );

        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(manager().validate("invalid.jwt.token").is_err());
    }
}
