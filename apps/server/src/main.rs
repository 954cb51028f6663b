use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use campus_api::{build_router, services::admin, AppState};
use campus_config::{load as load_config, AppConfig};
use campus_database::{
    prepare_database, redact_url, run_diagnostics, run_migrations, run_script, OnError,
    ScriptReport, StatementOutcome,
};
use campus_runtime::{shutdown_signal, telemetry, BackendServices};
use clap::{Parser, Subcommand};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "campus-backend")]
#[command(about = "Campus Hub backend (serves the API by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Apply the embedded schema migrations and exit
    Migrate,
    /// Execute a SQL file statement by statement
    RunSql {
        /// Path to the .sql file
        file: PathBuf,
        /// Keep going after a failed statement
        #[arg(long, conflicts_with = "atomic")]
        continue_on_error: bool,
        /// Run the whole file in one transaction; any failure rolls everything back
        #[arg(long)]
        atomic: bool,
    },
    /// Check connectivity and that every expected table exists
    CheckDb {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print dashboard counts
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("failed to load configuration")?;
    telemetry::init_tracing(&config.log).context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server(config).await,
        Commands::Migrate => migrate(&config).await,
        Commands::RunSql {
            file,
            continue_on_error,
            atomic,
        } => run_sql(&config, &file, continue_on_error, atomic).await,
        Commands::CheckDb { json } => check_db(&config, json).await,
        Commands::Stats => print_stats(&config).await,
    }
}

fn startup_warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.auth.uses_development_secret() {
        warnings.push(
            "auth.jwt_secret is the development default; set JWT_SECRET before deploying",
        );
    }
    warnings
}

async fn run_server(config: AppConfig) -> anyhow::Result<()> {
    // `load` validated already; warn here, once tracing is up.
    for warning in startup_warnings(&config) {
        warn!("{warning}");
    }

    info!("starting Campus Hub backend");

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = AppState::new(services.db_pool.clone(), services.authenticator.clone())
        .with_cors_origins(config.http.cors_origins.clone());
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    prepare_database(&config.database)
        .await
        .with_context(|| {
            format!(
                "failed to connect to {}",
                redact_url(&config.database.url)
            )
        })
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    run_migrations(&pool).await.context("database migrations failed")?;
    println!("Migrations applied.");
    Ok(())
}

async fn read_script(path: &Path) -> anyhow::Result<String> {
    let sql = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    if sql.trim().is_empty() {
        bail!("{} is empty", path.display());
    }
    Ok(sql)
}

async fn run_sql(
    config: &AppConfig,
    path: &Path,
    continue_on_error: bool,
    atomic: bool,
) -> anyhow::Result<()> {
    let sql = read_script(path).await?;
    let mut pool = connect(config).await?;

    let report = if atomic {
        let mut tx = pool.begin().await.context("failed to open transaction")?;
        let report = run_script(&mut *tx, &sql, OnError::Abort).await;
        if report.is_success() {
            tx.commit().await.context("failed to commit transaction")?;
        } else {
            tx.rollback().await.context("failed to roll back transaction")?;
            warn!("transaction rolled back, no statement from the file was kept");
        }
        report
    } else {
        let on_error = if continue_on_error {
            OnError::Continue
        } else {
            OnError::Abort
        };
        run_script(&mut pool, &sql, on_error).await
    };

    print_script_report(&report, atomic);

    if report.is_success() {
        Ok(())
    } else {
        bail!(
            "{} of {} statements failed",
            report.failed(),
            report.statements.len()
        )
    }
}

fn print_script_report(report: &ScriptReport, atomic: bool) {
    println!(
        "{} applied, {} failed, {} skipped",
        report.applied(),
        report.failed(),
        report.skipped()
    );

    for result in &report.statements {
        if let StatementOutcome::Failed { error } = &result.outcome {
            println!("statement {} failed: {error}", result.index + 1);
        }
    }

    if report.is_success() {
        return;
    }

    // A rolled-back transaction leaves every statement pending.
    let pending: Vec<&str> = if atomic {
        report
            .statements
            .iter()
            .map(|result| result.statement.as_str())
            .collect()
    } else {
        report.pending_statements().collect()
    };

    println!("\n-- Statements still to apply ({}):", pending.len());
    for statement in pending {
        println!("{statement};\n");
    }
}

async fn check_db(config: &AppConfig, json: bool) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let report = run_diagnostics(&pool)
        .await
        .context("database diagnostics failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("database:       {}", report.database);
        println!("server version: {}", report.server_version);
        println!("latency:        {} ms", report.latency_ms);
        println!();
        println!("{:<24} {:<8} {:>10}", "TABLE", "PRESENT", "ROWS");
        println!("{}", "-".repeat(44));
        for table in &report.tables {
            println!(
                "{:<24} {:<8} {:>10}",
                table.name,
                if table.present { "yes" } else { "NO" },
                table
                    .rows
                    .map(|rows| rows.to_string())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }

    if report.is_healthy() {
        Ok(())
    } else {
        bail!(
            "missing tables: {}; run `campus-backend migrate`",
            report.missing_tables().join(", ")
        )
    }
}

async fn print_stats(config: &AppConfig) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    let stats = admin::stats(&pool)
        .await
        .context("failed to collect stats")?;

    let rows = [
        ("users", stats.users_total),
        ("users (active)", stats.users_active),
        ("users (new, 7 days)", stats.users_new_last_7_days),
        ("market items", stats.items_total),
        ("market items (available)", stats.items_available),
        ("item comments", stats.comments_total),
        ("rides", stats.rides_total),
        ("rides (open)", stats.rides_open),
        ("groups", stats.groups_total),
        ("direct messages", stats.direct_messages_total),
        ("group messages", stats.group_messages_total),
    ];

    for (label, value) in rows {
        println!("{label:<28} {value:>10}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn development_secret_warns_exactly_once() {
        let config = AppConfig::default();
        let warnings = startup_warnings(&config);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("jwt_secret"));

        let mut configured = AppConfig::default();
        configured.auth.jwt_secret = "a-real-production-secret-value".into();
        assert!(startup_warnings(&configured).is_empty());
    }

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["campus-backend"]).unwrap();
        assert_eq!(cli.command, None);
    }

    #[test]
    fn run_sql_flags_parse() {
        let cli = Cli::try_parse_from(["campus-backend", "run-sql", "fix.sql", "--continue-on-error"])
            .unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::RunSql {
                file: PathBuf::from("fix.sql"),
                continue_on_error: true,
                atomic: false,
            })
        );
    }

    #[test]
    fn atomic_conflicts_with_continue_on_error() {
        let result = Cli::try_parse_from([
            "campus-backend",
            "run-sql",
            "fix.sql",
            "--atomic",
            "--continue-on-error",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn check_db_accepts_json_flag() {
        let cli = Cli::try_parse_from(["campus-backend", "check-db", "--json"]).unwrap();
        assert_eq!(cli.command, Some(Commands::CheckDb { json: true }));
    }

    #[tokio::test]
    async fn read_script_rejects_missing_and_blank_files() {
        let missing = read_script(Path::new("/definitely/not/here.sql")).await;
        assert!(missing.is_err());

        let mut blank = tempfile::NamedTempFile::new().unwrap();
        writeln!(blank, "   ").unwrap();
        assert!(read_script(blank.path()).await.is_err());

        let mut script = tempfile::NamedTempFile::new().unwrap();
        writeln!(script, "SELECT 1;").unwrap();
        assert_eq!(read_script(script.path()).await.unwrap().trim(), "SELECT 1;");
    }

    fn test_config() -> Option<AppConfig> {
        let Ok(url) = std::env::var("CAMPUS_TEST_DATABASE_URL") else {
            eprintln!("CAMPUS_TEST_DATABASE_URL not set, skipping");
            return None;
        };
        let mut config = AppConfig::default();
        config.database.url = url;
        config.database.max_connections = 2;
        Some(config)
    }

    async fn table_exists(config: &AppConfig, table: &str) -> anyhow::Result<bool> {
        let pool = connect(config).await?;
        let exists: bool = sqlx::query_scalar("SELECT to_regclass($1) IS NOT NULL")
            .bind(table)
            .fetch_one(&pool)
            .await?;
        pool.close().await;
        Ok(exists)
    }

    #[tokio::test]
    async fn atomic_run_sql_rolls_back_on_failure() -> anyhow::Result<()> {
        let Some(config) = test_config() else {
            return Ok(());
        };
        let table = format!("atomic_test_{}", uuid::Uuid::new_v4().simple());

        let mut script = tempfile::NamedTempFile::new()?;
        writeln!(script, "CREATE TABLE {table} (id INT PRIMARY KEY);")?;
        writeln!(script, "INSERT INTO {table} VALUES (1);")?;
        writeln!(script, "INSERT INTO {table} VALUES (1);")?;

        let result = run_sql(&config, script.path(), false, true).await;
        assert!(result.is_err());
        assert!(!table_exists(&config, &table).await?);
        Ok(())
    }

    #[tokio::test]
    async fn continue_on_error_run_sql_keeps_successful_statements() -> anyhow::Result<()> {
        let Some(config) = test_config() else {
            return Ok(());
        };
        let table = format!("continue_test_{}", uuid::Uuid::new_v4().simple());

        let mut script = tempfile::NamedTempFile::new()?;
        writeln!(script, "CREATE TABLE {table} (id INT PRIMARY KEY);")?;
        writeln!(script, "INSERT INTO {table} VALUES (1);")?;
        writeln!(script, "INSERT INTO {table} VALUES (1);")?;
        writeln!(script, "INSERT INTO {table} VALUES (2);")?;

        let result = run_sql(&config, script.path(), true, false).await;
        assert!(result.is_err(), "a failed statement still fails the command");

        let pool = connect(&config).await?;
        let rows: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await?;
        assert_eq!(rows, 2);

        sqlx::query(&format!("DROP TABLE {table}")).execute(&pool).await?;
        pool.close().await;
        Ok(())
    }
}
