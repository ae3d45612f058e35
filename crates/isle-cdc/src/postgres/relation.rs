//! Relation metadata and the relation cache.
//!
//! pgoutput announces each table's column layout in a Relation message before
//! any row that references it. The replication layer publishes those layouts
//! here; decoders read immutable [`Arc<RelationInfo>`] snapshots.

use crate::common::{CdcError, CdcFilter, FilterConfig, PatternCache, Result};
use crate::postgres::PostgresTypeMapper;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// REPLICA IDENTITY of a table, as announced in the Relation message.
///
/// Decides which columns the old row image of UPDATE/DELETE carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ReplicaIdentity {
    /// Primary-key columns only
    #[default]
    Default,
    /// No old row image
    Nothing,
    /// Every column
    Full,
    /// Columns of a chosen unique index
    Index,
    Unknown(u8),
}

impl ReplicaIdentity {
    /// Parse the pgoutput byte (`d`, `n`, `f`, `i`).
    pub fn from_byte(b: u8) -> Self {
        match b {
            b'd' => ReplicaIdentity::Default,
            b'n' => ReplicaIdentity::Nothing,
            b'f' => ReplicaIdentity::Full,
            b'i' => ReplicaIdentity::Index,
            other => ReplicaIdentity::Unknown(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            ReplicaIdentity::Default => b'd',
            ReplicaIdentity::Nothing => b'n',
            ReplicaIdentity::Full => b'f',
            ReplicaIdentity::Index => b'i',
            ReplicaIdentity::Unknown(b) => b,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, ReplicaIdentity::Full)
    }

    /// Check if UPDATE/DELETE can carry any old row image.
    pub fn has_before_image(&self) -> bool {
        !matches!(self, ReplicaIdentity::Nothing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicaIdentity::Default => "DEFAULT",
            ReplicaIdentity::Nothing => "NOTHING",
            ReplicaIdentity::Full => "FULL",
            ReplicaIdentity::Index => "INDEX",
            ReplicaIdentity::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for ReplicaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One column of a relation, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub type_oid: u32,
    /// Empty falls back to the built-in OID name table
    pub type_name: String,
    pub is_primary_key: bool,
    /// Values may be stored out of line and arrive as unchanged-TOAST
    pub is_toastable: bool,
}

impl Column {
    /// Create a non-key column, naming the type from the OID table.
    ///
    /// Toastability follows the type: variable-length built-ins are toastable.
    pub fn new(name: impl Into<String>, type_oid: u32) -> Self {
        Self {
            name: name.into(),
            type_oid,
            type_name: String::new(),
            is_primary_key: false,
            is_toastable: PostgresTypeMapper::is_toastable(type_oid),
        }
    }

    /// Create a primary-key column.
    pub fn primary_key(name: impl Into<String>, type_oid: u32) -> Self {
        Self {
            is_primary_key: true,
            ..Self::new(name, type_oid)
        }
    }

    /// Set an explicit type name.
    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = type_name.into();
        self
    }

    /// Override the toastable flag, e.g. from `pg_attribute.attstorage`.
    pub fn with_toastable(mut self, toastable: bool) -> Self {
        self.is_toastable = toastable;
        self
    }

    /// Type name reported in envelopes.
    pub fn effective_type_name(&self) -> &str {
        if self.type_name.is_empty() {
            PostgresTypeMapper::type_name_or_unknown(self.type_oid)
        } else {
            &self.type_name
        }
    }
}

/// Column layout of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationInfo {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub columns: Vec<Column>,
    pub replica_identity: ReplicaIdentity,
}

impl RelationInfo {
    pub fn new(
        oid: u32,
        schema: impl Into<String>,
        name: impl Into<String>,
        columns: Vec<Column>,
    ) -> Self {
        Self {
            oid,
            schema: schema.into(),
            name: name.into(),
            columns,
            replica_identity: ReplicaIdentity::Default,
        }
    }

    pub fn with_replica_identity(mut self, replica_identity: ReplicaIdentity) -> Self {
        self.replica_identity = replica_identity;
        self
    }

    /// `schema.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// `"schema"."table"`, safe to splice into SQL.
    pub fn quoted_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }

    /// `schema.table.column`
    pub fn qualified_column(&self, column: &str) -> String {
        format!("{}.{}.{}", self.schema, self.name, column)
    }

    /// Primary-key columns, in wire order.
    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Names of the primary-key columns, in wire order.
    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key_columns().map(|c| c.name.as_str()).collect()
    }

    pub fn has_toast_column(&self) -> bool {
        self.columns.iter().any(|c| c.is_toastable)
    }

    /// Names of the toastable columns, in wire order.
    pub fn toast_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_toastable)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Concurrent registry of relation layouts keyed by relation OID.
///
/// Also owns the column filter. Updates are validated against it: a layout
/// whose primary key would be dropped by `column_exclude` is rejected and the
/// previous entry (if any) stays in place. [`TupleDecoder`](super::TupleDecoder)
/// reads the same filter on every call.
#[derive(Debug)]
pub struct RelationCache {
    relations: RwLock<HashMap<u32, Arc<RelationInfo>>>,
    filter: RwLock<Arc<CdcFilter>>,
    patterns: Arc<PatternCache>,
}

impl Default for RelationCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RelationCache {
    /// Create an empty cache with no filter.
    pub fn new() -> Self {
        Self::with_patterns(Arc::new(PatternCache::new()))
    }

    /// Create an empty cache that compiles filter patterns through `patterns`.
    pub fn with_patterns(patterns: Arc<PatternCache>) -> Self {
        Self {
            relations: RwLock::new(HashMap::new()),
            filter: RwLock::new(Arc::new(CdcFilter::new(
                FilterConfig::default(),
                patterns.clone(),
            ))),
            patterns,
        }
    }

    /// Shared pattern cache.
    pub fn patterns(&self) -> &Arc<PatternCache> {
        &self.patterns
    }

    /// Replace the filter used to validate later updates and to drop
    /// columns at decode time.
    ///
    /// Relations already cached are not re-validated; decoding a row whose
    /// key the new filter excludes fails instead.
    pub fn set_filter(&self, config: FilterConfig) {
        *self.filter.write() = Arc::new(CdcFilter::new(config, self.patterns.clone()));
    }

    /// Current filter.
    pub fn filter(&self) -> Arc<CdcFilter> {
        self.filter.read().clone()
    }

    /// Publish a relation layout.
    pub fn update(&self, id: u32, info: RelationInfo) -> Result<()> {
        // hold the filter for the whole update so set_filter cannot interleave
        let filter = self.filter.read();
        if let Some(column) = excluded_primary_key(&filter, &info) {
            return Err(CdcError::PrimaryKeyExcluded {
                column: info.qualified_column(&column.name),
            });
        }

        debug!(
            relation_id = id,
            table = %info.qualified_name(),
            columns = info.columns.len(),
            replica_identity = %info.replica_identity,
            "relation updated"
        );
        self.relations.write().insert(id, Arc::new(info));
        Ok(())
    }

    /// Current layout for a relation.
    pub fn get(&self, id: u32) -> Option<Arc<RelationInfo>> {
        self.relations.read().get(&id).cloned()
    }

    /// Drop a relation, returning its last layout.
    pub fn remove(&self, id: u32) -> Option<Arc<RelationInfo>> {
        self.relations.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.relations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.read().is_empty()
    }
}

/// First primary-key column of `info` that `filter` excludes.
pub(crate) fn excluded_primary_key<'a>(
    filter: &CdcFilter,
    info: &'a RelationInfo,
) -> Option<&'a Column> {
    info.primary_key_columns()
        .find(|c| filter.column_excluded(&info.schema, &info.name, &c.name))
}
