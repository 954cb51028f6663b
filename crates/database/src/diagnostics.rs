//! Connectivity and schema checks for the `check-db` command.

use std::time::Instant;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::DatabaseResult;

/// Tables the application expects once migrations have run.
pub const EXPECTED_TABLES: &[&str] = &[
    "users",
    "email_verifications",
    "market_items",
    "item_comments",
    "rides",
    "ride_passengers",
    "conversations",
    "direct_messages",
    "groups",
    "group_members",
    "group_messages",
    "notifications",
];

#[derive(Debug, Clone, Serialize)]
pub struct TableStatus {
    pub name: String,
    pub present: bool,
    pub rows: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub latency_ms: u64,
    pub server_version: String,
    pub database: String,
    pub tables: Vec<TableStatus>,
}

impl DiagnosticReport {
    pub fn missing_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|table| !table.present)
            .map(|table| table.name.as_str())
            .collect()
    }

    pub fn is_healthy(&self) -> bool {
        self.tables.iter().all(|table| table.present)
    }
}

/// Round-trip the server, report its version and check every expected table.
pub async fn check(pool: &PgPool) -> DatabaseResult<DiagnosticReport> {
    let started = Instant::now();
    sqlx::query("SELECT 1").execute(pool).await?;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let server_version: String = sqlx::query_scalar("SHOW server_version")
        .fetch_one(pool)
        .await?;
    let database: String = sqlx::query_scalar("SELECT current_database()")
        .fetch_one(pool)
        .await?;

    let present: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_name = ANY($1)",
    )
    .bind(EXPECTED_TABLES)
    .fetch_all(pool)
    .await?;

    let mut tables = Vec::with_capacity(EXPECTED_TABLES.len());
    for name in EXPECTED_TABLES {
        let exists = present.iter().any(|table| table == name);
        let rows = if exists {
            // Table names come from the fixed list above, never from input.
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM \"{name}\""))
                .fetch_one(pool)
                .await?;
            Some(count)
        } else {
            warn!(table = name, "expected table is missing");
            None
        };

        tables.push(TableStatus {
            name: (*name).to_string(),
            present: exists,
            rows,
        });
    }

    info!(
        latency_ms,
        %server_version,
        %database,
        "database diagnostics complete"
    );

    Ok(DiagnosticReport {
        latency_ms,
        server_version,
        database,
        tables,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tables: &[(&str, bool)]) -> DiagnosticReport {
        DiagnosticReport {
            latency_ms: 3,
            server_version: "16.2".into(),
            database: "campus".into(),
            tables: tables
                .iter()
                .map(|(name, present)| TableStatus {
                    name: (*name).to_string(),
                    present: *present,
                    rows: present.then_some(0),
                })
                .collect(),
        }
    }

    #[test]
    fn expected_tables_are_unique() {
        let mut names = EXPECTED_TABLES.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), EXPECTED_TABLES.len());
    }

    #[test]
    fn missing_tables_are_reported() {
        let report = report(&[("users", true), ("rides", false), ("groups", false)]);
        assert!(!report.is_healthy());
        assert_eq!(report.missing_tables(), vec!["rides", "groups"]);
    }

    #[test]
    fn complete_schema_is_healthy() {
        let report = report(&[("users", true), ("rides", true)]);
        assert!(report.is_healthy());
        assert!(report.missing_tables().is_empty());
    }
}
