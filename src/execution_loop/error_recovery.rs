//! Error Recovery
//!
//! Proposes a corrected SQL text for an unknown-identifier error using the
//! schema catalog.

use crate::catalog::SchemaCatalog;
use crate::execution::result::{AutoFixAttempt, IdentifierKind};
use crate::execution_loop::error_classifier::UnknownIdentifier;
use crate::fuzzy_matcher::FuzzyMatcher;
use crate::sql;
use tracing::debug;

pub struct ErrorRecovery<'a> {
    catalog: &'a SchemaCatalog,
    matcher: &'a FuzzyMatcher,
}

impl<'a> ErrorRecovery<'a> {
    pub fn new(catalog: &'a SchemaCatalog, matcher: &'a FuzzyMatcher) -> Self {
        Self { catalog, matcher }
    }

    /// Returns the rewritten SQL and the repair it made, or `None` when the
    /// catalog has no confident match or the rewrite would change nothing.
    pub fn propose_fix(
        &self,
        sql: &str,
        unknown: &UnknownIdentifier,
        attempt_number: u32,
    ) -> Option<(String, AutoFixAttempt)> {
        let corrected = match unknown.kind {
            IdentifierKind::Table => self.catalog.find_similar_table(&unknown.name, self.matcher)?,
            IdentifierKind::Column => {
                self.catalog
                    .find_similar_column(&unknown.name, self.matcher)?
                    .0
            }
        };

        if corrected.eq_ignore_ascii_case(&unknown.name) {
            debug!(
                "Closest match for '{}' is itself; nothing to repair",
                unknown.name
            );
            return None;
        }

        let fixed = sql::replace_identifier(sql, &unknown.name, &corrected)?;
        Some((
            fixed,
            AutoFixAttempt {
                original_identifier: unknown.name.clone(),
                corrected_identifier: corrected,
                identifier_kind: unknown.kind,
                attempt_number,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::new(
            vec!["hrdatabase_employee".to_string()],
            vec![
                ("hrdatabase_employee".to_string(), "employee_id".to_string()),
                ("hrdatabase_employee".to_string(), "employee_name".to_string()),
            ],
        )
    }

    fn unknown(kind: IdentifierKind, name: &str, qualifier: Option<&str>) -> UnknownIdentifier {
        UnknownIdentifier {
            kind,
            name: name.to_string(),
            qualifier: qualifier.map(str::to_string),
        }
    }

    #[test]
    fn test_fixes_table_typo() {
        let catalog = catalog();
        let matcher = FuzzyMatcher::default();
        let recovery = ErrorRecovery::new(&catalog, &matcher);

        let (sql, attempt) = recovery
            .propose_fix(
                "SELECT * FROM hrdatabase_emplyee",
                &unknown(IdentifierKind::Table, "hrdatabase_emplyee", None),
                1,
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM hrdatabase_employee");
        assert_eq!(attempt.corrected_identifier, "hrdatabase_employee");
        assert_eq!(attempt.attempt_number, 1);
    }

    #[test]
    fn test_fixes_only_last_segment_of_qualified_column() {
        let catalog = catalog();
        let matcher = FuzzyMatcher::default();
        let recovery = ErrorRecovery::new(&catalog, &matcher);

        let (sql, attempt) = recovery
            .propose_fix(
                "SELECT e.employee_nme FROM hrdatabase_employee e",
                &unknown(IdentifierKind::Column, "employee_nme", Some("e")),
                1,
            )
            .unwrap();
        assert_eq!(sql, "SELECT e.employee_name FROM hrdatabase_employee e");
        assert_eq!(attempt.identifier_kind, IdentifierKind::Column);
    }

    #[test]
    fn test_no_confident_match() {
        let catalog = catalog();
        let matcher = FuzzyMatcher::default();
        let recovery = ErrorRecovery::new(&catalog, &matcher);

        assert!(recovery
            .propose_fix(
                "SELECT * FROM payroll_ledger",
                &unknown(IdentifierKind::Table, "payroll_ledger", None),
                1
            )
            .is_none());
    }

    #[test]
    fn test_identity_match_is_not_a_fix() {
        let catalog = catalog();
        let matcher = FuzzyMatcher::default();
        let recovery = ErrorRecovery::new(&catalog, &matcher);

        assert!(recovery
            .propose_fix(
                "SELECT employee_id FROM hrdatabase_employee",
                &unknown(IdentifierKind::Column, "employee_id", None),
                1
            )
            .is_none());
    }
}
