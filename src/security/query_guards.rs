//! Query Guards
//!
//! Statement-level policy applied to generated SQL before it is scoped and
//! executed.

use crate::error::{EngineError, Result};
use crate::security::policy::AccessLevel;
use crate::sql::lexer;
use crate::sql::{SqlStatement, StatementKind};
use serde::{Deserialize, Serialize};
use sqlparser::tokenizer::Token;
use tracing::warn;

/// Query guards configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryGuards {
    /// Let INSERT/UPDATE/DELETE and other non-SELECT statements through
    pub allow_writes: bool,
    /// Table names containing any of these need ALL_ACCESS
    pub restricted_tables: Vec<String>,
}

impl Default for QueryGuards {
    fn default() -> Self {
        Self {
            allow_writes: false,
            restricted_tables: vec!["financial".to_string(), "executives".to_string()],
        }
    }
}

impl QueryGuards {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `sql` for a caller at `level`.
    ///
    /// Unparsable SQL is rejected with `UnparsableSql`: it could not be scoped.
    pub fn check(&self, sql: &str, level: AccessLevel) -> Result<Vec<SqlStatement>> {
        let statements = SqlStatement::parse_all(sql)?;

        if !self.allow_writes {
            if let Some(pos) = statements
                .iter()
                .position(|s| s.kind() != StatementKind::Select)
            {
                warn!("Refusing non-SELECT statement #{} in generated SQL", pos + 1);
                return Err(EngineError::Refused(
                    "only read-only SELECT queries are allowed".to_string(),
                ));
            }
        }

        if level != AccessLevel::AllAccess {
            if let Some(table) = self.restricted_table_in(sql)? {
                warn!("Refusing access to restricted table '{}' at {}", table, level);
                return Err(EngineError::Refused(format!(
                    "table '{}' is restricted",
                    table
                )));
            }
        }

        Ok(statements)
    }

    /// First restricted name found in a table reference position: after
    /// FROM, JOIN, INTO, UPDATE or TABLE, after a comma inside a FROM list,
    /// and every part of a dotted name there.
    fn restricted_table_in(&self, sql: &str) -> Result<Option<String>> {
        let lexemes = lexer::tokenize(sql)?;
        let mut state = RefState::Other;
        // One "inside a FROM list" flag per parenthesis depth
        let mut in_from = vec![false];

        for lexeme in lexemes.iter().filter(|l| !l.is_trivia()) {
            if TABLE_INTRODUCERS.iter().any(|k| lexeme.is_keyword(k)) {
                if let Some(flag) = in_from.last_mut() {
                    *flag = lexeme.is_keyword("FROM") || lexeme.is_keyword("JOIN");
                }
                state = RefState::TableNext;
                continue;
            }
            if FROM_LIST_END.iter().any(|k| lexeme.is_keyword(k)) {
                if let Some(flag) = in_from.last_mut() {
                    *flag = false;
                }
                state = RefState::Other;
                continue;
            }

            let listing = in_from.last().copied().unwrap_or(false);
            state = match (&lexeme.token, state) {
                (Token::Word(word), RefState::TableNext) => {
                    if let Some(table) = self.restricted_name(&word.value) {
                        return Ok(Some(table));
                    }
                    RefState::AfterTable
                }
                (Token::Period, RefState::AfterTable) => RefState::TableNext,
                (Token::Comma, _) if listing => RefState::TableNext,
                (Token::LParen, _) => {
                    in_from.push(false);
                    RefState::Other
                }
                (Token::RParen, _) => {
                    if in_from.len() > 1 {
                        in_from.pop();
                    }
                    RefState::Other
                }
                _ => RefState::Other,
            };
        }
        Ok(None)
    }

    fn restricted_name(&self, ident: &str) -> Option<String> {
        let ident = ident.to_lowercase();
        self.restricted_tables
            .iter()
            .find(|t| ident.contains(&t.to_lowercase()))
            .cloned()
    }
}

/// Keywords followed by a table name
const TABLE_INTRODUCERS: &[&str] = &["FROM", "JOIN", "INTO", "UPDATE", "TABLE"];

/// Keywords that end a FROM list. ON / USING do not: a comma after a join
/// condition starts another table reference.
const FROM_LIST_END: &[&str] = &[
    "SELECT", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "INTERSECT", "EXCEPT", "SET",
    "VALUES", "WINDOW",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefState {
    TableNext,
    AfterTable,
    Other,
}
