//! Predicate Injection
//!
//! ANDs a scoping condition into the effective filter of every SELECT-shaped
//! statement, including subqueries and CTE bodies. Other statements pass
//! through unchanged.

use crate::error::{EngineError, Result};
use crate::sql::ast::SqlStatement;
use tracing::debug;

/// Rewrites `sql` so that every SELECT body filters on `predicate`.
///
/// Statements are rejoined with `"; "` and the result ends with a single `;`.
/// Fails with `UnparsableSql` (carrying the untouched input) when the
/// statement shape cannot be recognized; such SQL is unscoped.
pub fn inject_predicate(sql: &str, predicate: &str) -> Result<String> {
    inject_statements(SqlStatement::parse_all(sql)?, predicate)
}

/// `inject_predicate` over statements that were already parsed.
pub fn inject_statements(mut statements: Vec<SqlStatement>, predicate: &str) -> Result<String> {
    let predicate = predicate.trim();
    if predicate.is_empty() {
        return Err(EngineError::Refused("empty scope predicate".to_string()));
    }

    let rendered: Vec<String> = statements
        .iter_mut()
        .map(|statement| {
            statement.inject(predicate);
            statement.to_string()
        })
        .collect();

    let scoped = format!("{};", rendered.join("; "));
    debug!("Injected predicate '{}': {}", predicate, scoped);
    Ok(scoped)
}
