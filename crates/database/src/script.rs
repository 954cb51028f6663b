//! Statement-by-statement execution of SQL files.
//!
//! Used for ad-hoc schema changes and data fixes that do not belong in the
//! embedded migration set. Each statement runs on its own and its outcome is
//! logged, so a failing statement can be identified and re-applied by hand.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info, warn};

/// What to do when a statement fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnError {
    /// Log the failure and carry on with the next statement.
    Continue,
    /// Stop at the first failure; remaining statements are reported as skipped.
    Abort,
}

/// Something that can run a single SQL statement.
#[async_trait]
pub trait StatementExecutor: Send {
    /// Execute `sql` and return the number of affected rows.
    async fn execute_statement(&mut self, sql: &str) -> Result<u64, sqlx::Error>;
}

#[async_trait]
impl StatementExecutor for PgPool {
    async fn execute_statement(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(sql).execute(&*self).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl StatementExecutor for PgConnection {
    async fn execute_statement(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(sql).execute(&mut *self).await?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatementOutcome {
    Applied { rows_affected: u64 },
    Failed { error: String },
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatementResult {
    pub index: usize,
    pub statement: String,
    pub outcome: StatementOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptReport {
    pub statements: Vec<StatementResult>,
}

impl ScriptReport {
    pub fn applied(&self) -> usize {
        self.count(|outcome| matches!(outcome, StatementOutcome::Applied { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|outcome| matches!(outcome, StatementOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, StatementOutcome::Skipped))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && self.skipped() == 0
    }

    /// Statements that did not apply, in script order.
    pub fn pending_statements(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .filter(|result| !matches!(result.outcome, StatementOutcome::Applied { .. }))
            .map(|result| result.statement.as_str())
    }

    fn count(&self, predicate: impl Fn(&StatementOutcome) -> bool) -> usize {
        self.statements
            .iter()
            .filter(|result| predicate(&result.outcome))
            .count()
    }
}

/// Split SQL text into individual statements.
///
/// Semicolons inside single-quoted literals, double-quoted identifiers,
/// dollar-quoted bodies (`$$ … $$`, `$tag$ … $tag$`) and comments do not
/// terminate a statement. Fragments that contain only whitespace or comments
/// are dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let chars: Vec<char> = sql.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        match c {
            '-' if next == Some('-') => {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
                continue;
            }
            '/' if next == Some('*') => {
                current.push_str("/*");
                i += 2;
                let mut depth = 1;
                while i < chars.len() && depth > 0 {
                    if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                        depth += 1;
                        current.push_str("/*");
                        i += 2;
                    } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        depth -= 1;
                        current.push_str("*/");
                        i += 2;
                    } else {
                        current.push(chars[i]);
                        i += 1;
                    }
                }
                continue;
            }
            '\'' | '"' => {
                let backslash_escapes = c == '\'' && is_escape_string_prefix(&chars, i);
                has_code = true;
                current.push(c);
                i += 1;
                while i < chars.len() {
                    current.push(chars[i]);
                    if backslash_escapes && chars[i] == '\\' {
                        if let Some(&escaped) = chars.get(i + 1) {
                            current.push(escaped);
                        }
                        i += 2;
                        continue;
                    }
                    if chars[i] == c {
                        // A doubled quote is an escaped quote, not the end.
                        if chars.get(i + 1) == Some(&c) {
                            current.push(c);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
                continue;
            }
            '$' => {
                if let Some(tag) = dollar_tag(&chars, i) {
                    has_code = true;
                    let tag_len = tag.chars().count();
                    current.push_str(&tag);
                    i += tag_len;
                    while i < chars.len() {
                        if starts_with_at(&chars, i, &tag) {
                            current.push_str(&tag);
                            i += tag_len;
                            break;
                        }
                        current.push(chars[i]);
                        i += 1;
                    }
                    continue;
                }
                has_code = true;
                current.push(c);
                i += 1;
                continue;
            }
            ';' => {
                if has_code {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_code = false;
                i += 1;
                continue;
            }
            _ => {
                if !c.is_whitespace() {
                    has_code = true;
                }
                current.push(c);
                i += 1;
            }
        }
    }

    if has_code {
        statements.push(current.trim().to_string());
    }

    statements
}

/// Whether the quote at `quote` opens an `E'...'` string, where a backslash
/// escapes the next character.
fn is_escape_string_prefix(chars: &[char], quote: usize) -> bool {
    let Some(prefix) = quote.checked_sub(1).map(|at| chars[at]) else {
        return false;
    };
    if prefix != 'E' && prefix != 'e' {
        return false;
    }
    match quote.checked_sub(2).map(|at| chars[at]) {
        Some(before) => !(before.is_alphanumeric() || before == '_'),
        None => true,
    }
}

/// Returns the full dollar-quote delimiter (e.g. `$$` or `$body$`) starting at
/// `start`, if there is one.
fn dollar_tag(chars: &[char], start: usize) -> Option<String> {
    // `$1` is a positional parameter, not a quote.
    let mut end = start + 1;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        if end == start + 1 && chars[end].is_ascii_digit() {
            return None;
        }
        end += 1;
    }

    if chars.get(end) == Some(&'$') {
        Some(chars[start..=end].iter().collect())
    } else {
        None
    }
}

fn starts_with_at(chars: &[char], at: usize, needle: &str) -> bool {
    let mut index = at;
    for expected in needle.chars() {
        if chars.get(index) != Some(&expected) {
            return false;
        }
        index += 1;
    }
    true
}

fn preview(statement: &str) -> String {
    let line = statement.lines().next().unwrap_or_default();
    if line.chars().count() > 80 {
        let truncated: String = line.chars().take(77).collect();
        format!("{truncated}...")
    } else {
        line.to_string()
    }
}

/// Execute every statement in `sql` in order and report the outcome of each.
pub async fn run_script<E>(executor: &mut E, sql: &str, on_error: OnError) -> ScriptReport
where
    E: StatementExecutor + ?Sized,
{
    let statements = split_statements(sql);
    let total = statements.len();
    let mut report = ScriptReport::default();
    let mut aborted = false;

    info!(statements = total, ?on_error, "running sql script");

    for (index, statement) in statements.into_iter().enumerate() {
        if aborted {
            report.statements.push(StatementResult {
                index,
                statement,
                outcome: StatementOutcome::Skipped,
            });
            continue;
        }

        let outcome = match executor.execute_statement(&statement).await {
            Ok(rows_affected) => {
                info!(
                    statement = index + 1,
                    total,
                    rows_affected,
                    sql = %preview(&statement),
                    "statement applied"
                );
                StatementOutcome::Applied { rows_affected }
            }
            Err(err) => {
                error!(
                    statement = index + 1,
                    total,
                    sql = %preview(&statement),
                    error = %err,
                    "statement failed"
                );
                if on_error == OnError::Abort {
                    aborted = true;
                }
                StatementOutcome::Failed {
                    error: err.to_string(),
                }
            }
        };

        report.statements.push(StatementResult {
            index,
            statement,
            outcome,
        });
    }

    if aborted {
        warn!(
            skipped = report.skipped(),
            "script aborted, remaining statements were not executed"
        );
    }

    info!(
        applied = report.applied(),
        failed = report.failed(),
        skipped = report.skipped(),
        "sql script finished"
    );

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingExecutor {
        executed: Vec<String>,
        fail_when_contains: Option<&'static str>,
    }

    impl RecordingExecutor {
        fn new(fail_when_contains: Option<&'static str>) -> Self {
            Self {
                executed: Vec::new(),
                fail_when_contains,
            }
        }
    }

    #[async_trait]
    impl StatementExecutor for RecordingExecutor {
        async fn execute_statement(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
            self.executed.push(sql.to_string());
            match self.fail_when_contains {
                Some(needle) if sql.contains(needle) => {
                    Err(sqlx::Error::Protocol(format!("rejected: {needle}")))
                }
                _ => Ok(1),
            }
        }
    }

    #[test]
    fn split_handles_plain_statements() {
        let statements = split_statements(
            "CREATE TABLE a (id INT);\nINSERT INTO a VALUES (1);\n\nSELECT 1",
        );
        assert_eq!(
            statements,
            vec![
                "CREATE TABLE a (id INT)",
                "INSERT INTO a VALUES (1)",
                "SELECT 1"
            ]
        );
    }

    #[test]
    fn split_ignores_semicolons_in_literals_and_identifiers() {
        let statements = split_statements(
            r#"INSERT INTO notes (body) VALUES ('a; b; it''s fine'); SELECT "odd;name" FROM t;"#,
        );
        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0],
            "INSERT INTO notes (body) VALUES ('a; b; it''s fine')"
        );
        assert_eq!(statements[1], r#"SELECT "odd;name" FROM t"#);
    }

    #[test]
    fn split_honours_backslash_escapes_in_e_strings() {
        let statements =
            split_statements(r"INSERT INTO t (b) VALUES (E'it\'s; fine'); SELECT 'a\'; SELECT 1;");
        assert_eq!(
            statements,
            vec![
                r"INSERT INTO t (b) VALUES (E'it\'s; fine')",
                r"SELECT 'a\'",
                "SELECT 1",
            ]
        );
    }

    #[test]
    fn split_keeps_dollar_quoted_function_bodies_whole() {
        let sql = r#"
            CREATE OR REPLACE FUNCTION touch_updated_at() RETURNS trigger AS $body$
            BEGIN
                NEW.updated_at = now();
                RETURN NEW;
            END;
            $body$ LANGUAGE plpgsql;
            DO $$ BEGIN RAISE NOTICE 'x;y'; END $$;
        "#;

        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].starts_with("CREATE OR REPLACE FUNCTION"));
        assert!(statements[0].ends_with("LANGUAGE plpgsql"));
        assert!(statements[1].starts_with("DO $$"));
    }

    #[test]
    fn split_does_not_treat_positional_parameters_as_quotes() {
        let statements = split_statements("SELECT $1; SELECT 2;");
        assert_eq!(statements, vec!["SELECT $1", "SELECT 2"]);
    }

    #[test]
    fn split_drops_comment_only_fragments() {
        let sql = "-- header; with semicolon\n/* block; comment */\n;\nSELECT 1; -- trailing\n";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("SELECT 1"));
    }

    #[test]
    fn split_handles_nested_block_comments() {
        let statements = split_statements("/* outer /* inner; */ still; */ SELECT 1;");
        assert_eq!(statements.len(), 1);
        assert!(statements[0].ends_with("SELECT 1"));
    }

    #[tokio::test]
    async fn run_script_continues_past_failures_when_asked() {
        let mut executor = RecordingExecutor::new(Some("broken"));
        let report = run_script(
            &mut executor,
            "SELECT 1; SELECT broken; SELECT 3;",
            OnError::Continue,
        )
        .await;

        assert_eq!(executor.executed.len(), 3);
        assert_eq!(report.applied(), 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 0);
        assert!(!report.is_success());
        assert_eq!(
            report.pending_statements().collect::<Vec<_>>(),
            vec!["SELECT broken"]
        );
    }

    #[tokio::test]
    async fn run_script_aborts_on_first_failure() {
        let mut executor = RecordingExecutor::new(Some("broken"));
        let report = run_script(
            &mut executor,
            "SELECT 1; SELECT broken; SELECT 3; SELECT 4;",
            OnError::Abort,
        )
        .await;

        assert_eq!(executor.executed, vec!["SELECT 1", "SELECT broken"]);
        assert_eq!(report.applied(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.skipped(), 2);
        assert_eq!(
            report.pending_statements().collect::<Vec<_>>(),
            vec!["SELECT broken", "SELECT 3", "SELECT 4"]
        );
    }

    #[tokio::test]
    async fn run_script_reports_success_when_everything_applies() {
        let mut executor = RecordingExecutor::new(None);
        let report = run_script(&mut executor, "SELECT 1; SELECT 2", OnError::Abort).await;

        assert!(report.is_success());
        assert_eq!(report.applied(), 2);
        assert!(matches!(
            report.statements[0].outcome,
            StatementOutcome::Applied { rows_affected: 1 }
        ));
    }

    #[tokio::test]
    async fn run_script_on_empty_input_is_a_no_op() {
        let mut executor = RecordingExecutor::new(None);
        let report = run_script(&mut executor, "  -- nothing here\n", OnError::Continue).await;

        assert!(executor.executed.is_empty());
        assert!(report.statements.is_empty());
        assert!(report.is_success());
    }
}
