//! Schema, table and column filtering for CDC events
//!
//! Patterns are regular expressions evaluated against qualified names:
//!
//! | Level  | Subject                | Include | Exclude |
//! |--------|------------------------|---------|---------|
//! | schema | `schema`               | yes     | yes     |
//! | table  | `schema.table`         | yes     | yes     |
//! | column | `schema.table.column`  | no      | yes     |
//!
//! Exclusion always overrides inclusion, and an empty include list includes
//! everything.
//!
//! # Example
//!
//! ```rust
//! use isle_cdc::common::{CdcFilter, FilterConfig};
//!
//! let filter = CdcFilter::from_config(FilterConfig {
//!     schema_include: vec!["^public$".to_string()],
//!     table_exclude: vec![r"\.audit_log$".to_string()],
//!     column_exclude: vec![r"^public\.users\.password$".to_string()],
//!     ..Default::default()
//! });
//!
//! assert!(filter.matches("public", "users"));
//! assert!(!filter.matches("public", "audit_log"));
//! assert!(filter.column_excluded("public", "users", "password"));
//! ```

use crate::common::PatternCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Include/exclude pattern lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Schemas to include (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema_include: Vec<String>,

    /// Schemas to exclude
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema_exclude: Vec<String>,

    /// Tables to include, matched against `schema.table` (empty = all)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_include: Vec<String>,

    /// Tables to exclude, matched against `schema.table`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_exclude: Vec<String>,

    /// Columns to drop, matched against `schema.table.column`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_exclude: Vec<String>,
}

impl FilterConfig {
    /// Check if no pattern is configured at any level.
    pub fn is_empty(&self) -> bool {
        self.schema_include.is_empty()
            && self.schema_exclude.is_empty()
            && self.table_include.is_empty()
            && self.table_exclude.is_empty()
            && self.column_exclude.is_empty()
    }
}

/// Filter evaluated through a shared [`PatternCache`].
#[derive(Debug, Clone)]
pub struct CdcFilter {
    config: FilterConfig,
    patterns: Arc<PatternCache>,
}

impl Default for CdcFilter {
    fn default() -> Self {
        Self::from_config(FilterConfig::default())
    }
}

impl CdcFilter {
    /// Create a filter that shares an existing pattern cache.
    pub fn new(config: FilterConfig, patterns: Arc<PatternCache>) -> Self {
        Self { config, patterns }
    }

    /// Create a filter with its own pattern cache.
    pub fn from_config(config: FilterConfig) -> Self {
        Self::new(config, Arc::new(PatternCache::new()))
    }

    /// Check if a table passes the schema and table rules.
    pub fn matches(&self, schema: &str, table: &str) -> bool {
        let c = &self.config;

        if !c.schema_include.is_empty() && !self.patterns.matches_any(schema, &c.schema_include)
        {
            return false;
        }
        if self.patterns.matches_any(schema, &c.schema_exclude) {
            return false;
        }

        let full_name = format!("{}.{}", schema, table);
        if !c.table_include.is_empty() && !self.patterns.matches_any(&full_name, &c.table_include)
        {
            return false;
        }
        !self.patterns.matches_any(&full_name, &c.table_exclude)
    }

    /// Check if a column is dropped from decoded rows.
    pub fn column_excluded(&self, schema: &str, table: &str, column: &str) -> bool {
        if self.config.column_exclude.is_empty() {
            return false;
        }
        let full_name = format!("{}.{}.{}", schema, table, column);
        self.patterns
            .matches_any(&full_name, &self.config.column_exclude)
    }

    /// Get the filter configuration
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }
}
