//! Schema Catalog
//!
//! Table and column names of the active database, used to repair misnamed
//! identifiers in generated SQL.

use crate::db::Connection;
use crate::error::{EngineError, Result};
use crate::fuzzy_matcher::FuzzyMatcher;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Table names in catalog order
    pub tables: Vec<String>,
    /// `(table, column)` pairs in catalog order
    pub columns: Vec<(String, String)>,
}

impl SchemaCatalog {
    pub fn new(tables: Vec<String>, columns: Vec<(String, String)>) -> Self {
        Self { tables, columns }
    }

    /// Reads the store's metadata. Any failure is `SchemaUnavailable`.
    pub fn load(conn: &mut dyn Connection) -> Result<Self> {
        let tables = conn
            .table_names()
            .map_err(|e| EngineError::SchemaUnavailable(e.to_string()))?;
        let columns = conn
            .column_names()
            .map_err(|e| EngineError::SchemaUnavailable(e.to_string()))?;

        info!(
            "Loaded schema catalog: {} tables, {} columns",
            tables.len(),
            columns.len()
        );
        Ok(Self { tables, columns })
    }

    pub fn has_table(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(name))
    }

    pub fn columns_of<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.columns
            .iter()
            .filter(move |(t, _)| t.eq_ignore_ascii_case(table))
            .map(|(_, c)| c.as_str())
    }

    pub fn find_similar_table(&self, name: &str, matcher: &FuzzyMatcher) -> Option<String> {
        let found = matcher
            .find_best_match(name, self.tables.iter().map(String::as_str))
            .map(|(table, _)| table.to_string());
        debug!("Closest table to '{}': {:?}", name, found);
        found
    }

    /// Closest column name paired with the first table that owns it.
    pub fn find_similar_column(
        &self,
        name: &str,
        matcher: &FuzzyMatcher,
    ) -> Option<(String, String)> {
        let distinct = self
            .columns
            .iter()
            .map(|(_, column)| column.as_str())
            .unique_by(|column| column.to_lowercase());

        let (column, _) = matcher.find_best_match(name, distinct)?;
        let owner = self
            .columns
            .iter()
            .find(|(_, c)| c == column)
            .map(|(t, _)| t.clone())?;

        debug!("Closest column to '{}': {}.{}", name, owner, column);
        Some((column.to_string(), owner))
    }

    /// Compact `table(col, col, ...)` lines for prompts and the CLI.
    pub fn summary(&self) -> String {
        self.tables
            .iter()
            .map(|table| {
                format!("{}({})", table, self.columns_of(table).join(", "))
            })
            .join("\n")
    }
}

/// Time-bounded catalog cache with explicit invalidation
pub struct CatalogCache {
    ttl: Duration,
    entry: Option<(SchemaCatalog, Instant)>,
}

impl CatalogCache {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get_or_load(&mut self, conn: &mut dyn Connection) -> Result<SchemaCatalog> {
        if let Some((catalog, loaded_at)) = &self.entry {
            if loaded_at.elapsed() < self.ttl {
                return Ok(catalog.clone());
            }
            debug!("Schema catalog expired after {:?}", self.ttl);
        }

        match SchemaCatalog::load(conn) {
            Ok(catalog) => {
                self.entry = Some((catalog.clone(), Instant::now()));
                Ok(catalog)
            }
            Err(e) => {
                warn!("Schema catalog reload failed: {}", e);
                self.entry = None;
                Err(e)
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn is_fresh(&self) -> bool {
        matches!(&self.entry, Some((_, loaded_at)) if loaded_at.elapsed() < self.ttl)
    }
}
