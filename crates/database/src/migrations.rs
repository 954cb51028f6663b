//! Database migrations

use sqlx::PgPool;
use tracing::info;

use crate::error::DatabaseResult;

// Include migrations from the workspace migrations directory
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    MIGRATOR.run(pool).await?;
    info!(
        migrations = MIGRATOR.iter().count(),
        "database migrations applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrator_embeds_versions_in_order() {
        let versions: Vec<i64> = MIGRATOR.iter().map(|migration| migration.version).collect();

        assert!(!versions.is_empty(), "at least one migration should be embedded");
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn first_migration_creates_users() {
        let first = MIGRATOR
            .iter()
            .next()
            .expect("at least one migration should be embedded");
        assert!(first.sql.contains("CREATE TABLE IF NOT EXISTS users"));
    }
}
