//! Database connection management

use std::time::Duration;

use campus_config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::info;

use crate::error::{DatabaseError, DatabaseResult};
use crate::migrations::run_migrations;

/// Prepare and establish a database connection pool
pub async fn prepare_database(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    let pool = pool_options(config)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::Connection)?;

    info!(
        host = %redact_url(&config.url),
        max_connections = config.max_connections,
        "database connection established"
    );
    Ok(pool)
}

/// Connect and, unless disabled in configuration, bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    let pool = prepare_database(config).await?;

    if config.run_migrations {
        run_migrations(&pool).await?;
    } else {
        info!("database.run_migrations is false, leaving schema untouched");
    }

    Ok(pool)
}

/// Build a pool that connects on first use. Handy for wiring a router before
/// the database is reachable.
pub fn lazy_pool(config: &DatabaseConfig) -> DatabaseResult<PgPool> {
    pool_options(config)
        .connect_lazy(&config.url)
        .map_err(DatabaseError::Connection)
}

fn pool_options(config: &DatabaseConfig) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
}

/// Strip credentials from a connection string before it reaches the logs.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    match rest.rsplit_once('@') {
        Some((_, host)) => format!("{scheme}://***@{host}"),
        None => url.to_string(),
    }
}
