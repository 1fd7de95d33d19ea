//! Auto-Fix Executor
//!
//! Bounded retry loop: runs SQL, and on an unknown table or column repairs
//! the identifier from the schema catalog and tries again.

use crate::catalog::SchemaCatalog;
use crate::db::{ConnectionFactory, DbError};
use crate::execution::result::{AutoFixAttempt, ExecutionOutcome, ExecutionReport};
use crate::execution_loop::error_classifier::ErrorClassifier;
use crate::execution_loop::error_recovery::ErrorRecovery;
use crate::fuzzy_matcher::FuzzyMatcher;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Executes SQL with fuzzy identifier repair
pub struct AutoFixExecutor {
    factory: Arc<dyn ConnectionFactory>,
    matcher: FuzzyMatcher,
    classifier: ErrorClassifier,
}

impl AutoFixExecutor {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            matcher: FuzzyMatcher::default(),
            classifier: ErrorClassifier::new(),
        }
    }

    pub fn with_similarity_cutoff(mut self, cutoff: f64) -> Self {
        self.matcher = FuzzyMatcher::new(cutoff);
        self
    }

    pub fn run(
        &self,
        sql: &str,
        catalog: Option<&SchemaCatalog>,
        max_retries: u32,
    ) -> ExecutionOutcome {
        self.run_with_trace(sql, catalog, max_retries).outcome
    }

    /// Runs `sql` on one connection, retrying at most `max_retries` times.
    ///
    /// Without a catalog no repair is attempted and the first store error is
    /// reported as is.
    pub fn run_with_trace(
        &self,
        sql: &str,
        catalog: Option<&SchemaCatalog>,
        max_retries: u32,
    ) -> ExecutionReport {
        let started = Instant::now();
        let mut current_sql = sql.to_string();
        let mut attempts: Vec<AutoFixAttempt> = Vec::new();
        let mut executions = 0u32;

        let outcome = match self.factory.connect() {
            Err(e) => {
                error!("Could not acquire database connection: {}", e);
                ExecutionOutcome::Failure(self.classifier.describe(&e, &current_sql))
            }
            Ok(mut conn) => loop {
                executions += 1;
                debug!("Execution attempt {}: {}", executions, current_sql);

                let err = match conn.execute(&current_sql) {
                    Ok(result) => {
                        info!(
                            "Query succeeded on attempt {} ({} repairs)",
                            executions,
                            attempts.len()
                        );
                        break ExecutionOutcome::from(result);
                    }
                    Err(e) => e,
                };

                let retries_used = attempts.len() as u32;
                match self.repair(&err, &current_sql, catalog, retries_used, max_retries) {
                    Some((fixed_sql, attempt)) => {
                        info!(
                            "Retrying with {:?} '{}' -> '{}'",
                            attempt.identifier_kind,
                            attempt.original_identifier,
                            attempt.corrected_identifier
                        );
                        current_sql = fixed_sql;
                        attempts.push(attempt);
                    }
                    None => {
                        warn!("Query failed after {} attempt(s): {}", executions, err);
                        break ExecutionOutcome::Failure(
                            self.classifier.describe(&err, &current_sql),
                        );
                    }
                }
            },
        };

        ExecutionReport {
            outcome,
            attempts,
            final_sql: current_sql,
            executions,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn repair(
        &self,
        err: &DbError,
        sql: &str,
        catalog: Option<&SchemaCatalog>,
        retries_used: u32,
        max_retries: u32,
    ) -> Option<(String, AutoFixAttempt)> {
        if !self.classifier.is_recoverable(err) {
            return None;
        }
        if retries_used >= max_retries {
            debug!("Retry budget of {} exhausted", max_retries);
            return None;
        }
        let Some(catalog) = catalog else {
            debug!("No schema catalog; skipping repair");
            return None;
        };

        let unknown = self.classifier.unknown_identifier(err)?;
        ErrorRecovery::new(catalog, &self.matcher).propose_fix(sql, &unknown, retries_used + 1)
    }
}
