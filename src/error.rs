use crate::db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The statement shape was not recognized. `sql` is the unmodified input;
    /// it was NOT scoped and must not be executed as if it were.
    #[error("Unparsable SQL: {reason}")]
    UnparsableSql { sql: String, reason: String },

    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Query refused: {0}")]
    Refused(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn unparsable(sql: &str, reason: impl Into<String>) -> Self {
        EngineError::UnparsableSql {
            sql: sql.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
