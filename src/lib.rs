pub mod agent;
pub mod agent_prompts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod execution_loop;
pub mod fuzzy_matcher;
pub mod llm;
pub mod security;
pub mod sql;

pub use agent::{HrAgent, Models, PipelineReply};
pub use catalog::{CatalogCache, SchemaCatalog};
pub use config::EngineConfig;
pub use db::{Connection, ConnectionFactory, DbError, DbErrorKind, SqliteStore};
pub use error::{EngineError, Result};
pub use execution::{
    AutoFixAttempt, Diagnostic, ErrorKind, ExecutionOutcome, ExecutionReport, IdentifierKind,
    ResultFormatter,
};
pub use execution_loop::AutoFixExecutor;
pub use llm::{ChatResponder, DbNeed, IntentClassifier, LlmClient, SqlGenerator};
pub use security::{
    resolve_scope, AccessLevel, CallerContext, QueryGuards, RolePolicy, RoleProfile, Scope,
    ScopeResolver,
};
pub use sql::{inject_predicate, SqlStatement, StatementKind};
