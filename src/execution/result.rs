//! Execution Result - outcome of one executor invocation

use crate::db::{DbErrorKind, RowSet, StatementResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable error category shown to downstream consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Syntax,
    UnknownField,
    UnknownTable,
    Other,
}

impl ErrorKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::UnknownField => "unknown-field",
            ErrorKind::UnknownTable => "unknown-table",
            ErrorKind::Other => "other",
        }
    }
}

impl From<DbErrorKind> for ErrorKind {
    fn from(kind: DbErrorKind) -> Self {
        match kind {
            DbErrorKind::Syntax => ErrorKind::Syntax,
            DbErrorKind::UnknownColumn => ErrorKind::UnknownField,
            DbErrorKind::UnknownTable => ErrorKind::UnknownTable,
            DbErrorKind::Other => ErrorKind::Other,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// User-safe description of a terminal failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub message: String,
    /// SQL of the failing attempt, when it is safe to show
    pub sql: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sql: None,
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(sql) = &self.sql {
            write!(f, "\nQuery: {}", sql)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Rows(RowSet),
    Affected(usize),
    Failure(Diagnostic),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, ExecutionOutcome::Failure(_))
    }
}

impl From<StatementResult> for ExecutionOutcome {
    fn from(result: StatementResult) -> Self {
        match result {
            StatementResult::Rows(rows) => ExecutionOutcome::Rows(rows),
            StatementResult::Affected(n) => ExecutionOutcome::Affected(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Table,
    Column,
}

/// One repair made by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoFixAttempt {
    pub original_identifier: String,
    pub corrected_identifier: String,
    pub identifier_kind: IdentifierKind,
    /// 1-based retry number this repair fed into
    pub attempt_number: u32,
}

/// Outcome plus the repair trace of one executor invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub outcome: ExecutionOutcome,
    pub attempts: Vec<AutoFixAttempt>,
    /// SQL of the last execution
    pub final_sql: String,
    /// Number of times SQL was sent to the store
    pub executions: u32,
    pub execution_time_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        assert_eq!(ErrorKind::from(DbErrorKind::UnknownColumn).tag(), "unknown-field");
        assert_eq!(ErrorKind::from(DbErrorKind::UnknownTable).tag(), "unknown-table");
        assert_eq!(ErrorKind::Syntax.to_string(), "syntax");
        assert_eq!(
            serde_json::to_string(&ErrorKind::UnknownField).unwrap(),
            "\"unknown-field\""
        );
    }

    #[test]
    fn test_diagnostic_display_includes_sql() {
        let diagnostic = Diagnostic::new(ErrorKind::Syntax, "syntax error").with_sql("SELEC 1");
        assert_eq!(diagnostic.to_string(), "syntax error\nQuery: SELEC 1");
    }
}
