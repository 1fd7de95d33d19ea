//! HR agent pipeline
//!
//! caller role + SQL -> guards -> scope (join + predicate) -> auto-fix
//! executor -> formatted reply. `answer` puts the model collaborators in
//! front of that: classify, then chat or NL2SQL.

use crate::agent_prompts::{build_nl2sql_prompt, extract_sql, is_refusal};
use crate::catalog::{CatalogCache, SchemaCatalog};
use crate::config::EngineConfig;
use crate::db::ConnectionFactory;
use crate::error::{EngineError, Result};
use crate::execution::{AutoFixAttempt, ExecutionOutcome, ResultFormatter};
use crate::execution_loop::AutoFixExecutor;
use crate::llm::{ChatResponder, DbNeed, IntentClassifier, SqlGenerator};
use crate::security::{AccessLevel, CallerContext, RoleProfile, ScopeResolver};
use crate::sql::{inject_predicate, inject_statements};
use std::sync::{Arc, Mutex};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

pub const ACCESS_DENIED_MESSAGE: &str = "You do not have permission to view this information.";
pub const UNSCOPED_MESSAGE: &str =
    "The generated query could not be checked against your access scope, so it was not run.";
pub const REFUSED_MESSAGE: &str = "This request was not run";
pub const UPSTREAM_MESSAGE: &str =
    "Sorry, the assistant is temporarily unavailable. Please try again later.";
pub const CANNOT_ANSWER_MESSAGE: &str =
    "Sorry, I could not turn that question into a database query.";
pub const INTERNAL_MESSAGE: &str = "Sorry, something went wrong while answering.";

/// Reply of one pipeline run
#[derive(Debug)]
pub struct PipelineReply {
    /// User-safe text for the chat transport
    pub text: String,
    /// Structured outcome, when SQL was executed
    pub outcome: Option<ExecutionOutcome>,
    /// SQL of the last execution
    pub executed_sql: Option<String>,
    pub attempts: Vec<AutoFixAttempt>,
    /// Why nothing was executed; full detail stays here and in the log
    pub error: Option<EngineError>,
}

impl PipelineReply {
    fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            outcome: None,
            executed_sql: None,
            attempts: Vec::new(),
            error: None,
        }
    }

    fn refused(err: EngineError) -> Self {
        let text = match &err {
            EngineError::AccessDenied(_) => ACCESS_DENIED_MESSAGE.to_string(),
            EngineError::UnparsableSql { .. } => UNSCOPED_MESSAGE.to_string(),
            EngineError::Refused(reason) => format!("{}: {}.", REFUSED_MESSAGE, reason),
            EngineError::UpstreamUnavailable(_) => UPSTREAM_MESSAGE.to_string(),
            _ => INTERNAL_MESSAGE.to_string(),
        };
        warn!("Request not executed: {}", err);
        Self {
            error: Some(err),
            ..Self::message(text)
        }
    }
}

/// Model collaborators used by `answer`
#[derive(Clone)]
pub struct Models {
    pub generator: Arc<dyn SqlGenerator>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub chat: Arc<dyn ChatResponder>,
}

pub struct HrAgent {
    config: EngineConfig,
    factory: Arc<dyn ConnectionFactory>,
    resolver: ScopeResolver,
    executor: AutoFixExecutor,
    formatter: ResultFormatter,
    catalog_cache: Option<Mutex<CatalogCache>>,
    models: Option<Models>,
}

impl HrAgent {
    pub fn new(config: EngineConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        let executor = AutoFixExecutor::new(Arc::clone(&factory))
            .with_similarity_cutoff(config.executor.similarity_cutoff);
        let catalog_cache = config.catalog_ttl().map(|ttl| Mutex::new(CatalogCache::new(ttl)));

        Self {
            resolver: ScopeResolver::new(config.scope.clone()),
            executor,
            formatter: ResultFormatter::new(),
            catalog_cache,
            models: None,
            factory,
            config,
        }
    }

    pub fn with_models(mut self, models: Models) -> Self {
        self.models = Some(models);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn access_level(&self, profile: &RoleProfile) -> AccessLevel {
        self.config.roles.access_level(profile)
    }

    /// Guards, scopes and rewrites `raw_sql` without executing it.
    ///
    /// Fails closed: unparsable SQL, refused statements and scopes whose join
    /// cannot be applied are errors, never unscoped SQL.
    pub fn prepare_sql(
        &self,
        raw_sql: &str,
        caller: &CallerContext,
        level: AccessLevel,
    ) -> Result<String> {
        let statements = self.config.guards.check(raw_sql, level)?;

        let scope = self.resolver.resolve_scope(level, caller)?;
        if scope.is_unrestricted() {
            return Ok(raw_sql.trim().to_string());
        }

        match &scope.required_join {
            // The join changes the text, so the rewritten SQL is parsed again
            Some(join) => {
                let joined = self.resolver.apply_join(raw_sql, join)?;
                inject_predicate(&joined, &scope.predicate)
            }
            None => inject_statements(statements, &scope.predicate),
        }
    }

    /// Scopes and executes SQL for one caller.
    pub fn run_scoped_sql(
        &self,
        raw_sql: &str,
        caller: &CallerContext,
        level: AccessLevel,
        max_retries: u32,
    ) -> PipelineReply {
        let span = info_span!("request", id = %Uuid::new_v4(), level = %level);
        let _enter = span.enter();

        let sql = match self.prepare_sql(raw_sql, caller, level) {
            Ok(sql) => sql,
            Err(e) => return PipelineReply::refused(e),
        };
        info!("Executing scoped SQL: {}", sql);

        let catalog = self.load_catalog();
        let report = self
            .executor
            .run_with_trace(&sql, catalog.as_ref(), max_retries);

        PipelineReply {
            text: self.formatter.format(&report.outcome),
            outcome: Some(report.outcome),
            executed_sql: Some(report.final_sql),
            attempts: report.attempts,
            error: None,
        }
    }

    /// Answers a natural-language question for `profile`.
    pub async fn answer(&self, question: &str, profile: &RoleProfile) -> PipelineReply {
        let span = info_span!("request", id = %Uuid::new_v4(), employee_id = profile.employee_id);
        self.answer_inner(question, profile).instrument(span).await
    }

    async fn answer_inner(&self, question: &str, profile: &RoleProfile) -> PipelineReply {
        let Some(models) = &self.models else {
            return PipelineReply::refused(EngineError::Config(
                "no language model configured".to_string(),
            ));
        };

        let need = match models.classifier.classify(question).await {
            Ok(need) => need,
            Err(e) => return PipelineReply::refused(e),
        };
        info!("Question classified as {:?}", need);

        if need == DbNeed::NoDb {
            return match models.chat.respond(question).await {
                Ok(text) => PipelineReply::message(text),
                Err(e) => PipelineReply::refused(e),
            };
        }

        let summary = self
            .load_catalog()
            .map(|catalog| catalog.summary())
            .unwrap_or_default();
        let prompt = build_nl2sql_prompt(&summary, question);

        let reply = match models.generator.generate_sql(&prompt).await {
            Ok(reply) => reply,
            Err(e) => return PipelineReply::refused(e),
        };
        let sql = extract_sql(&reply);
        if is_refusal(&sql) {
            info!("Generator declined the question");
            return PipelineReply::message(CANNOT_ANSWER_MESSAGE);
        }

        let level = self.access_level(profile);
        self.run_scoped_sql(
            &sql,
            &profile.caller_context(),
            level,
            self.config.executor.max_retries,
        )
    }

    /// Fresh catalog, bypassing any cache
    pub fn schema(&self) -> Result<SchemaCatalog> {
        let mut conn = self
            .factory
            .connect()
            .map_err(|e| EngineError::SchemaUnavailable(e.to_string()))?;
        SchemaCatalog::load(conn.as_mut())
    }

    pub fn invalidate_catalog(&self) {
        if let Some(cache) = &self.catalog_cache {
            cache.lock().unwrap_or_else(|p| p.into_inner()).invalidate();
        }
    }

    /// Catalog for the repair path; `None` disables auto-fix for this request.
    fn load_catalog(&self) -> Option<SchemaCatalog> {
        let loaded = match &self.catalog_cache {
            Some(cache) => self
                .factory
                .connect()
                .map_err(|e| EngineError::SchemaUnavailable(e.to_string()))
                .and_then(|mut conn| {
                    cache
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .get_or_load(conn.as_mut())
                }),
            None => self.schema(),
        };

        match loaded {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                warn!("Auto-fix disabled for this request: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Connection, DbError};

    struct NoStore;

    impl ConnectionFactory for NoStore {
        fn connect(&self) -> std::result::Result<Box<dyn Connection>, DbError> {
            Err(DbError::Connection("no store in unit tests".to_string()))
        }
    }

    fn agent() -> HrAgent {
        HrAgent::new(EngineConfig::default(), Arc::new(NoStore))
    }

    #[test]
    fn test_prepare_sql_self_only() {
        let sql = agent()
            .prepare_sql(
                "SELECT * FROM hrdatabase_employee",
                &CallerContext::new(7),
                AccessLevel::SelfOnly,
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM hrdatabase_employee WHERE employee_id=7;");
    }

    #[test]
    fn test_prepare_sql_department_joins_then_filters() {
        let caller = CallerContext::new(2).with_department("Dev");
        let sql = agent()
            .prepare_sql(
                "SELECT e.employee_name FROM hrdatabase_employee ORDER BY e.employee_name",
                &caller,
                AccessLevel::DepartmentAccess,
            )
            .unwrap();
        assert_eq!(
            sql,
            "SELECT e.employee_name FROM hrdatabase_employee e JOIN hrdatabase_teammanagement t \
             ON e.employee_id = t.employee_id WHERE t.department='Dev' ORDER BY e.employee_name;"
        );
    }

    #[test]
    fn test_prepare_sql_all_access_is_untouched() {
        let sql = agent()
            .prepare_sql(
                "SELECT * FROM hrdatabase_employee ",
                &CallerContext::new(1),
                AccessLevel::AllAccess,
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM hrdatabase_employee");
    }

    #[test]
    fn test_unparsable_sql_is_never_executed() {
        let reply = agent().run_scoped_sql(
            "SELECT * FROM (SELECT * FROM hrdatabase_employee",
            &CallerContext::new(7),
            AccessLevel::SelfOnly,
            1,
        );
        assert_eq!(reply.text, UNSCOPED_MESSAGE);
        assert!(reply.outcome.is_none());
        assert!(matches!(reply.error, Some(EngineError::UnparsableSql { .. })));
    }

    #[test]
    fn test_missing_team_is_access_denied() {
        let reply = agent().run_scoped_sql(
            "SELECT * FROM hrdatabase_employee",
            &CallerContext::new(7),
            AccessLevel::TeamAccess,
            1,
        );
        assert_eq!(reply.text, ACCESS_DENIED_MESSAGE);
    }

    #[test]
    fn test_store_outage_is_user_safe() {
        let reply = agent().run_scoped_sql(
            "SELECT * FROM hrdatabase_employee",
            &CallerContext::new(7),
            AccessLevel::SelfOnly,
            1,
        );
        assert!(reply.text.starts_with("[other]"));
        assert!(!reply.text.contains("no store in unit tests"));
        assert!(matches!(reply.outcome, Some(ExecutionOutcome::Failure(_))));
    }

    #[test]
    fn test_write_refused_by_default() {
        let reply = agent().run_scoped_sql(
            "DELETE FROM hrdatabase_employee",
            &CallerContext::new(1),
            AccessLevel::AllAccess,
            1,
        );
        assert!(reply.text.starts_with(REFUSED_MESSAGE));
        assert!(reply.outcome.is_none());
    }
}
