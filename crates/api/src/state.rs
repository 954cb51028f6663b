use std::sync::Arc;

use campus_auth::{AuthError, Authenticator, User};
use sqlx::PgPool;

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    db_pool: PgPool,
    authenticator: Authenticator,
    cors_origins: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(db_pool: PgPool, authenticator: Authenticator) -> Self {
        Self {
            db_pool,
            authenticator,
            cors_origins: Arc::new(Vec::new()),
        }
    }

    /// Restrict CORS to these origins. An empty list allows any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Arc::new(origins);
        self
    }

    pub fn db_pool(&self) -> &PgPool {
        &self.db_pool
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }

    pub async fn authenticate(&self, token: &str) -> Result<User, ApiError> {
        self.authenticator
            .authenticate_token(token)
            .await
            .map_err(ApiError::from)
    }

    /// Resolve an optional bearer token. A bad or disabled credential reads as
    /// an anonymous viewer; anything else is still an error.
    pub async fn authenticate_optional(
        &self,
        token: Option<&str>,
    ) -> Result<Option<User>, ApiError> {
        let Some(token) = token else {
            return Ok(None);
        };
        anonymous_on_credential_error(self.authenticator.authenticate_token(token).await)
            .map_err(ApiError::from)
    }
}

fn anonymous_on_credential_error(
    result: Result<User, AuthError>,
) -> Result<Option<User>, AuthError> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(AuthError::InvalidToken | AuthError::AccountDisabled) => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_credentials_read_as_anonymous() {
        assert!(matches!(
            anonymous_on_credential_error(Err(AuthError::InvalidToken)),
            Ok(None)
        ));
        assert!(matches!(
            anonymous_on_credential_error(Err(AuthError::AccountDisabled)),
            Ok(None)
        ));
    }

    #[test]
    fn database_failures_are_not_swallowed() {
        let result =
            anonymous_on_credential_error(Err(AuthError::Database(sqlx::Error::PoolTimedOut)));
        assert!(matches!(result, Err(AuthError::Database(_))));
    }
}
