//! Error Classifier
//!
//! Classifies store errors, pulls the offending identifier out of the error
//! text, and builds the user-facing diagnostic.

use crate::db::{DbError, DbErrorKind};
use crate::execution::result::{Diagnostic, ErrorKind, IdentifierKind};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MYSQL_UNKNOWN_COLUMN: Regex = Regex::new(r"Unknown column '([^']+)'").unwrap();
    static ref MYSQL_UNKNOWN_TABLE: Regex = Regex::new(r"Table '([^']+)' doesn't exist").unwrap();
    static ref SQLITE_UNKNOWN_COLUMN: Regex = Regex::new(r"no such column: (\S+)").unwrap();
    static ref SQLITE_UNKNOWN_TABLE: Regex = Regex::new(r"no such table: (\S+)").unwrap();
}

pub const CONNECTION_FAILURE_MESSAGE: &str =
    "The database is unavailable right now. Please try again later.";

/// An unknown identifier reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIdentifier {
    pub kind: IdentifierKind,
    /// Last segment of the reported name; the only part ever rewritten
    pub name: String,
    /// Everything before the last `.`, e.g. a table alias or database name
    pub qualifier: Option<String>,
}

impl UnknownIdentifier {
    fn parse(kind: IdentifierKind, raw: &str) -> Option<Self> {
        let raw = raw.trim_matches(|c| matches!(c, '"' | '\'' | '`' | ',' | ')'));
        let (qualifier, name) = match raw.rsplit_once('.') {
            Some((q, n)) => (Some(q.trim_matches('`').to_string()), n),
            None => (None, raw),
        };
        let name = name.trim_matches('`');
        if name.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            name: name.to_string(),
            qualifier,
        })
    }
}

/// Error classifier
pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &DbError) -> ErrorKind {
        match error {
            DbError::Statement { kind, .. } => ErrorKind::from(*kind),
            DbError::Connection(_) => ErrorKind::Other,
        }
    }

    /// Whether the auto-fix path may act on this error
    pub fn is_recoverable(&self, error: &DbError) -> bool {
        matches!(error, DbError::Statement { kind, .. } if kind.is_recoverable())
    }

    /// Offending identifier of an unknown-table / unknown-column error
    pub fn unknown_identifier(&self, error: &DbError) -> Option<UnknownIdentifier> {
        match error {
            DbError::Statement {
                kind: DbErrorKind::UnknownColumn,
                message,
                ..
            } => extract_unknown_column(message)
                .and_then(|raw| UnknownIdentifier::parse(IdentifierKind::Column, &raw)),
            DbError::Statement {
                kind: DbErrorKind::UnknownTable,
                message,
                ..
            } => extract_unknown_table(message)
                .and_then(|raw| UnknownIdentifier::parse(IdentifierKind::Table, &raw)),
            _ => None,
        }
    }

    /// User-safe diagnostic for a terminal error on `sql`.
    ///
    /// Connection failures never echo driver detail or SQL.
    pub fn describe(&self, error: &DbError, sql: &str) -> Diagnostic {
        match error {
            DbError::Connection(_) => Diagnostic::new(ErrorKind::Other, CONNECTION_FAILURE_MESSAGE),
            DbError::Statement {
                kind,
                code,
                message,
            } => {
                let lead = match kind {
                    DbErrorKind::Syntax => "SQL syntax error.".to_string(),
                    DbErrorKind::UnknownColumn => {
                        "The query refers to a column that does not exist.".to_string()
                    }
                    DbErrorKind::UnknownTable => {
                        "The query refers to a table that does not exist.".to_string()
                    }
                    DbErrorKind::Other => format!("Database error (code {}).", code),
                };
                Diagnostic::new(
                    ErrorKind::from(*kind),
                    format!("{}\nError message: {}", lead, message),
                )
                .with_sql(sql)
            }
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Column name from `Unknown column 'x'` or `no such column: x`
pub fn extract_unknown_column(message: &str) -> Option<String> {
    MYSQL_UNKNOWN_COLUMN
        .captures(message)
        .or_else(|| SQLITE_UNKNOWN_COLUMN.captures(message))
        .map(|c| c[1].to_string())
}

/// Table name from `Table 'db.x' doesn't exist` or `no such table: x`
pub fn extract_unknown_table(message: &str) -> Option<String> {
    MYSQL_UNKNOWN_TABLE
        .captures(message)
        .or_else(|| SQLITE_UNKNOWN_TABLE.captures(message))
        .map(|c| c[1].to_string())
}
