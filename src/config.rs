//! Engine configuration
//!
//! Defaults, optionally overlaid by a JSON file and then by environment
//! variables (`HRQ_*`, `OPENAI_*`).

use crate::error::{EngineError, Result};
use crate::security::{QueryGuards, RolePolicy, ScopeTables};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub executor: ExecutorConfig,
    pub scope: ScopeTables,
    pub roles: RolePolicy,
    pub guards: QueryGuards,
    pub llm: LlmConfig,
    /// Cache the schema catalog for this long; `None` loads it per request
    pub catalog_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hr.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub similarity_cutoff: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            similarity_cutoff: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            api_key: None,
            timeout_secs: 60,
            temperature: 0.1,
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlays values found through `lookup` (usually `std::env::var`).
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("HRQ_DATABASE_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(v) = lookup("HRQ_MAX_RETRIES") {
            self.executor.max_retries = parse_var("HRQ_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("HRQ_SIMILARITY_CUTOFF") {
            self.executor.similarity_cutoff = parse_var("HRQ_SIMILARITY_CUTOFF", &v)?;
        }
        if let Some(v) = lookup("HRQ_ALLOW_WRITES") {
            self.guards.allow_writes = parse_var("HRQ_ALLOW_WRITES", &v)?;
        }
        if let Some(v) = lookup("HRQ_CATALOG_TTL_SECS") {
            self.catalog_ttl_secs = Some(parse_var("HRQ_CATALOG_TTL_SECS", &v)?);
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.executor.similarity_cutoff) {
            return Err(EngineError::Config(format!(
                "similarity_cutoff must be within 0.0..=1.0, got {}",
                self.executor.similarity_cutoff
            )));
        }
        if self.scope.employee_table.trim().is_empty() || self.scope.team_table.trim().is_empty() {
            return Err(EngineError::Config("scope tables must be named".to_string()));
        }
        Ok(())
    }

    pub fn catalog_ttl(&self) -> Option<Duration> {
        self.catalog_ttl_secs.map(Duration::from_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{} has an invalid value '{}'", name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.executor.max_retries, 1);
        assert_eq!(config.executor.similarity_cutoff, 0.6);
        assert!(!config.guards.allow_writes);
        assert_eq!(config.scope.employee_table, "hrdatabase_employee");
        assert!(config.catalog_ttl().is_none());
    }

    #[test]
    fn test_apply_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HRQ_DATABASE_PATH", "/data/hr.sqlite"),
            ("HRQ_MAX_RETRIES", "2"),
            ("HRQ_CATALOG_TTL_SECS", "300"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_env(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database.path, PathBuf::from("/data/hr.sqlite"));
        assert_eq!(config.executor.max_retries, 2);
        assert_eq!(config.catalog_ttl(), Some(Duration::from_secs(300)));
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_invalid_env_value() {
        let mut config = EngineConfig::default();
        let result = config.apply_env(|k| (k == "HRQ_MAX_RETRIES").then(|| "many".to_string()));
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_from_file_partial_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hrq.json");
        std::fs::write(
            &path,
            r#"{"executor": {"max_retries": 0}, "guards": {"restricted_tables": ["payroll"]}}"#,
        )
        .unwrap();

        let config = EngineConfig::from_file(&path).unwrap();
        assert_eq!(config.executor.max_retries, 0);
        assert_eq!(config.executor.similarity_cutoff, 0.6);
        assert_eq!(config.guards.restricted_tables, vec!["payroll"]);
        assert!(!config.guards.allow_writes);
    }

    #[test]
    fn test_out_of_range_cutoff_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hrq.json");
        std::fs::write(&path, r#"{"executor": {"similarity_cutoff": 1.5}}"#).unwrap();

        assert!(matches!(
            EngineConfig::from_file(&path),
            Err(EngineError::Config(_))
        ));
    }
}
