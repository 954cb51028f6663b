//! Campus Hub database crate
//!
//! Connection management for the hosted Postgres instance, the embedded schema
//! migrations, and the tooling used to apply ad-hoc SQL files and diagnose
//! connectivity.

pub mod connection;
pub mod diagnostics;
pub mod error;
pub mod migrations;
pub mod script;

pub use connection::{initialize_database, lazy_pool, prepare_database, redact_url};
pub use diagnostics::{check as run_diagnostics, DiagnosticReport, TableStatus, EXPECTED_TABLES};
pub use error::{DatabaseError, DatabaseResult};
pub use migrations::run_migrations;
pub use script::{
    run_script, split_statements, OnError, ScriptReport, StatementExecutor, StatementOutcome,
    StatementResult,
};
