//! Access Control
//!
//! Turns an access level plus the caller's scoping facts into a row filter
//! and, for team and department scopes, the join that makes the filter's
//! columns reachable.

use crate::error::{EngineError, Result};
use crate::security::policy::{AccessLevel, CallerContext};
use crate::sql::lexer::{self, Lexeme};
use serde::{Deserialize, Serialize};
use sqlparser::tokenizer::Token;
use tracing::debug;

/// Words that may follow a bare base-table reference without being an alias
const CLAUSE_WORDS: &[&str] = &[
    "WHERE", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL", "GROUP", "ORDER",
    "HAVING", "LIMIT", "OFFSET", "UNION", "INTERSECT", "EXCEPT", "WINDOW", "ON", "USING",
];

/// Names of the tables and columns scope predicates refer to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeTables {
    pub employee_table: String,
    pub employee_alias: String,
    pub team_table: String,
    pub team_alias: String,
    pub key_column: String,
    pub team_column: String,
    pub department_column: String,
}

impl Default for ScopeTables {
    fn default() -> Self {
        Self {
            employee_table: "hrdatabase_employee".to_string(),
            employee_alias: "e".to_string(),
            team_table: "hrdatabase_teammanagement".to_string(),
            team_alias: "t".to_string(),
            key_column: "employee_id".to_string(),
            team_column: "team_id".to_string(),
            department_column: "department".to_string(),
        }
    }
}

impl ScopeTables {
    /// `<employee> e JOIN <team> t ON e.<key> = t.<key>`
    pub fn joined_form(&self) -> String {
        format!(
            "{emp} {ea} JOIN {team} {ta} ON {ea}.{key} = {ta}.{key}",
            emp = self.employee_table,
            ea = self.employee_alias,
            team = self.team_table,
            ta = self.team_alias,
            key = self.key_column,
        )
    }
}

/// Row filter for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub predicate: String,
    /// Replacement for the bare employee table reference, when needed
    pub required_join: Option<String>,
}

impl Scope {
    pub fn unrestricted() -> Self {
        Self {
            predicate: "true".to_string(),
            required_join: None,
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.predicate == "true" && self.required_join.is_none()
    }
}

/// Resolves scopes against a fixed set of table names
#[derive(Debug, Clone, Default)]
pub struct ScopeResolver {
    tables: ScopeTables,
}

impl ScopeResolver {
    pub fn new(tables: ScopeTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &ScopeTables {
        &self.tables
    }

    pub fn resolve_scope(&self, level: AccessLevel, caller: &CallerContext) -> Result<Scope> {
        let t = &self.tables;
        let scope = match level {
            AccessLevel::AllAccess => Scope::unrestricted(),
            AccessLevel::DepartmentAccess => {
                let department = required(&caller.department_name, "department", level)?;
                Scope {
                    predicate: format!(
                        "{}.{}={}",
                        t.team_alias,
                        t.department_column,
                        quote_literal(department)
                    ),
                    required_join: Some(t.joined_form()),
                }
            }
            AccessLevel::TeamAccess => {
                let team = required(&caller.team_name, "team", level)?;
                Scope {
                    predicate: format!("{}.{}={}", t.team_alias, t.team_column, quote_literal(team)),
                    required_join: Some(t.joined_form()),
                }
            }
            AccessLevel::SelfOnly => Scope {
                predicate: format!("{}={}", t.key_column, caller.employee_id),
                required_join: None,
            },
        };

        debug!("Resolved {} scope: {:?}", level, scope);
        Ok(scope)
    }

    /// Rewrites every `FROM <employee_table>` to the joined form.
    ///
    /// Only the bare, unaliased table name is recognized. SQL that never names
    /// the employee table that way, or aliases it, is refused rather than run
    /// with a predicate over an alias that does not exist. String literals and
    /// comments are never rewritten.
    pub fn apply_join(&self, sql: &str, joined: &str) -> Result<String> {
        let table = &self.tables.employee_table;
        let mut lexemes = lexer::tokenize(sql)?;
        let significant: Vec<usize> = lexemes
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.is_trivia())
            .map(|(idx, _)| idx)
            .collect();

        let mut targets = Vec::new();
        for (pos, &idx) in significant.iter().enumerate() {
            if !lexemes[idx].is_keyword("FROM") {
                continue;
            }
            let Some(&table_idx) = significant.get(pos + 1) else {
                continue;
            };
            if !names_table(&lexemes[table_idx], table) {
                continue;
            }
            if let Some(alias) = significant.get(pos + 2).and_then(|&n| alias_word(&lexemes[n])) {
                return Err(EngineError::Refused(format!(
                    "{} is referenced through alias '{}'; scoped joins need the bare table name",
                    table, alias
                )));
            }
            targets.push(table_idx);
        }

        if targets.is_empty() {
            return Err(EngineError::Refused(format!(
                "query does not select from {}; cannot apply a scoped join",
                table
            )));
        }

        for idx in targets {
            lexemes[idx].text = joined.to_string();
        }
        Ok(lexemes.iter().map(|l| l.text.as_str()).collect())
    }
}

fn names_table(lexeme: &Lexeme, table: &str) -> bool {
    matches!(&lexeme.token, Token::Word(w) if w.value.eq_ignore_ascii_case(table))
}

/// The word following a table reference, when it would act as an alias
fn alias_word(lexeme: &Lexeme) -> Option<&str> {
    match &lexeme.token {
        Token::Word(w) if w.quote_style.is_some() => Some(w.value.as_str()),
        Token::Word(w) if !CLAUSE_WORDS.iter().any(|k| k.eq_ignore_ascii_case(&w.value)) => {
            Some(w.value.as_str())
        }
        _ => None,
    }
}

/// Resolves a scope with the default HR table names.
pub fn resolve_scope(level: AccessLevel, caller: &CallerContext) -> Result<Scope> {
    ScopeResolver::default().resolve_scope(level, caller)
}

/// Single-quoted SQL string literal with embedded quotes doubled
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn required<'a>(value: &'a Option<String>, what: &str, level: AccessLevel) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(EngineError::AccessDenied(format!(
            "{} requires a {} name but the caller has none",
            level, what
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_access_is_unrestricted() {
        let scope = resolve_scope(AccessLevel::AllAccess, &CallerContext::new(1)).unwrap();
        assert_eq!(scope.predicate, "true");
        assert!(scope.is_unrestricted());
    }

    #[test]
    fn test_self_only_predicate() {
        let scope = resolve_scope(AccessLevel::SelfOnly, &CallerContext::new(7)).unwrap();
        assert_eq!(scope.predicate, "employee_id=7");
        assert_eq!(scope.required_join, None);
    }

    #[test]
    fn test_department_and_team_predicates() {
        let caller = CallerContext::new(3).with_team("T2").with_department("Dev");

        let dept = resolve_scope(AccessLevel::DepartmentAccess, &caller).unwrap();
        assert_eq!(dept.predicate, "t.department='Dev'");
        assert_eq!(
            dept.required_join.as_deref(),
            Some("hrdatabase_employee e JOIN hrdatabase_teammanagement t ON e.employee_id = t.employee_id")
        );

        let team = resolve_scope(AccessLevel::TeamAccess, &caller).unwrap();
        assert_eq!(team.predicate, "t.team_id='T2'");
    }

    #[test]
    fn test_missing_team_is_denied() {
        let caller = CallerContext::new(3).with_department("Dev");
        assert!(matches!(
            resolve_scope(AccessLevel::TeamAccess, &caller),
            Err(EngineError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_literal_quotes_are_doubled() {
        let caller = CallerContext::new(3).with_department("R&D's Lab");
        let scope = resolve_scope(AccessLevel::DepartmentAccess, &caller).unwrap();
        assert_eq!(scope.predicate, "t.department='R&D''s Lab'");
    }

    #[test]
    fn test_apply_join_replaces_bare_reference() {
        let resolver = ScopeResolver::default();
        let joined = resolver.tables().joined_form();
        let sql = resolver
            .apply_join("select name from hrdatabase_employee where gender = 'F'", &joined)
            .unwrap();
        assert_eq!(
            sql,
            "select name from hrdatabase_employee e JOIN hrdatabase_teammanagement t ON e.employee_id = t.employee_id where gender = 'F'"
        );
    }

    #[test]
    fn test_apply_join_refuses_alias() {
        let resolver = ScopeResolver::default();
        let joined = resolver.tables().joined_form();
        let result = resolver.apply_join("SELECT x.name FROM hrdatabase_employee AS x", &joined);
        assert!(matches!(result, Err(EngineError::Refused(_))));
    }

    #[test]
    fn test_apply_join_refuses_missing_base_table() {
        let resolver = ScopeResolver::default();
        let joined = resolver.tables().joined_form();
        let result = resolver.apply_join("SELECT * FROM hrdatabase_attendancerecords", &joined);
        assert!(matches!(result, Err(EngineError::Refused(_))));
    }

    #[test]
    fn test_apply_join_leaves_literals_and_comments_alone() {
        let resolver = ScopeResolver::default();
        let joined = resolver.tables().joined_form();
        let sql = resolver
            .apply_join(
                "SELECT employee_name, 'copied FROM hrdatabase_employee' AS note \
                 FROM hrdatabase_employee -- FROM hrdatabase_employee x",
                &joined,
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT employee_name, 'copied FROM hrdatabase_employee' AS note \
             FROM hrdatabase_employee e JOIN hrdatabase_teammanagement t ON e.employee_id = t.employee_id \
             -- FROM hrdatabase_employee x"
        );
    }

    #[test]
    fn test_apply_join_ignores_table_named_only_in_literal() {
        let resolver = ScopeResolver::default();
        let joined = resolver.tables().joined_form();
        let result = resolver.apply_join(
            "SELECT 'FROM hrdatabase_employee' FROM hrdatabase_attendancemanagement",
            &joined,
        );
        assert!(matches!(result, Err(EngineError::Refused(_))));
    }
}
