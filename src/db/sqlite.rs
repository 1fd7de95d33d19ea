//! SQLite store
//!
//! Opens a fresh rusqlite connection per `connect()`. SQLite error text is
//! mapped onto the MySQL-compatible codes the executor understands.

use crate::db::{
    Connection, ConnectionFactory, DbError, RowSet, StatementResult, ER_BAD_FIELD_ERROR,
    ER_NO_SUCH_TABLE, ER_SYNTAX_ERROR,
};
use rusqlite::types::ValueRef;
use rusqlite::{ErrorCode, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConnectionFactory for SqliteStore {
    fn connect(&self) -> Result<Box<dyn Connection>, DbError> {
        // No SQLITE_OPEN_CREATE: a missing database is a connection failure
        let conn = rusqlite::Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DbError::Connection(format!("{}: {}", self.path.display(), e)))?;

        debug!("Opened SQLite connection to {}", self.path.display());
        Ok(Box::new(SqliteConnection { conn }))
    }
}

pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str) -> Result<StatementResult, DbError> {
        let statements =
            crate::sql::split_statements(sql).unwrap_or_else(|_| vec![sql.to_string()]);

        let tx = self.conn.transaction().map_err(classify_error)?;
        let mut first_rows: Option<RowSet> = None;
        let mut affected = 0usize;
        for (idx, statement) in statements.iter().enumerate() {
            match run_statement(&tx, statement)? {
                StatementResult::Rows(rows) if first_rows.is_none() => first_rows = Some(rows),
                StatementResult::Rows(_) => {
                    warn!("Result set of statement #{} discarded; only the first is returned", idx + 1)
                }
                StatementResult::Affected(n) => affected += n,
            }
        }
        tx.commit().map_err(classify_error)?;

        // First result set wins; write-only batches report the total
        Ok(match first_rows {
            Some(rows) => StatementResult::Rows(rows),
            None => StatementResult::Affected(affected),
        })
    }

    fn table_names(&mut self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' \
                 ORDER BY rowid",
            )
            .map_err(classify_error)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(classify_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify_error)?;
        Ok(names)
    }

    fn column_names(&mut self) -> Result<Vec<(String, String)>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT m.name, p.name FROM sqlite_master m \
                 JOIN pragma_table_info(m.name) p \
                 WHERE m.type IN ('table', 'view') AND m.name NOT LIKE 'sqlite_%' \
                 ORDER BY m.rowid, p.cid",
            )
            .map_err(classify_error)?;
        let pairs = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(classify_error)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify_error)?;
        Ok(pairs)
    }
}

fn run_statement(conn: &rusqlite::Connection, sql: &str) -> Result<StatementResult, DbError> {
    let mut stmt = conn.prepare(sql).map_err(classify_error)?;

    if stmt.column_count() == 0 {
        let affected = stmt.execute([]).map_err(classify_error)?;
        return Ok(StatementResult::Affected(affected));
    }

    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([]).map_err(classify_error)?;
    let mut data = Vec::new();
    while let Some(row) = rows.next().map_err(classify_error)? {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(to_json(row.get_ref(idx).map_err(classify_error)?));
        }
        data.push(values);
    }

    Ok(StatementResult::Rows(RowSet {
        columns,
        rows: data,
    }))
}

fn to_json(value: ValueRef<'_>) -> serde_json::Value {
    match value {
        ValueRef::Null => serde_json::Value::Null,
        ValueRef::Integer(i) => serde_json::Value::from(i),
        ValueRef::Real(f) => serde_json::Value::from(f),
        ValueRef::Text(t) => serde_json::Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => serde_json::Value::String(format!("<blob {} bytes>", b.len())),
    }
}

fn classify_error(err: rusqlite::Error) -> DbError {
    let message = err.to_string();

    let native_code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => {
            if matches!(
                failure.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
            ) {
                return DbError::Connection(message);
            }
            failure.extended_code
        }
        _ => -1,
    };

    let lower = message.to_lowercase();
    let code = if lower.starts_with("no such table") {
        ER_NO_SUCH_TABLE
    } else if lower.starts_with("no such column") {
        ER_BAD_FIELD_ERROR
    } else if lower.contains("syntax error")
        || lower.contains("incomplete input")
        || lower.contains("unrecognized token")
    {
        ER_SYNTAX_ERROR
    } else {
        native_code
    };

    DbError::statement(code, message)
}
