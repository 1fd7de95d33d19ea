//! Relational store interface
//!
//! The executor and the schema catalog reach the database only through these
//! traits. Connections are short-lived: acquire one per invocation and drop it
//! before returning.

pub mod sqlite;

pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MySQL-compatible error codes shared by every backend
pub const ER_SYNTAX_ERROR: i32 = 1064;
pub const ER_BAD_FIELD_ERROR: i32 = 1054;
pub const ER_NO_SUCH_TABLE: i32 = 1146;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbErrorKind {
    Syntax,
    UnknownColumn,
    UnknownTable,
    Other,
}

impl DbErrorKind {
    pub fn from_code(code: i32) -> Self {
        match code {
            ER_SYNTAX_ERROR => DbErrorKind::Syntax,
            ER_BAD_FIELD_ERROR => DbErrorKind::UnknownColumn,
            ER_NO_SUCH_TABLE => DbErrorKind::UnknownTable,
            _ => DbErrorKind::Other,
        }
    }

    /// Unknown identifiers may be repaired and retried
    pub fn is_recoverable(self) -> bool {
        matches!(self, DbErrorKind::UnknownColumn | DbErrorKind::UnknownTable)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DbError {
    #[error("{message} (code {code})")]
    Statement {
        kind: DbErrorKind,
        code: i32,
        message: String,
    },

    /// Connectivity, timeouts, unopenable files: never retried
    #[error("connection failure: {0}")]
    Connection(String),
}

impl DbError {
    pub fn statement(code: i32, message: impl Into<String>) -> Self {
        DbError::Statement {
            kind: DbErrorKind::from_code(code),
            code,
            message: message.into(),
        }
    }
}

/// Rows returned by a read
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StatementResult {
    Rows(RowSet),
    Affected(usize),
}

/// One open database session
pub trait Connection: Send {
    /// Runs `sql` (possibly several `;`-separated statements) in one
    /// transaction: committed on success, rolled back on any error.
    /// Returns the first statement's result set, or the total affected
    /// rows when no statement reads.
    fn execute(&mut self, sql: &str) -> Result<StatementResult, DbError>;

    /// Table names in catalog order
    fn table_names(&mut self) -> Result<Vec<String>, DbError>;

    /// `(table, column)` pairs in catalog order
    fn column_names(&mut self) -> Result<Vec<(String, String)>, DbError>;
}

pub trait ConnectionFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError>;
}
