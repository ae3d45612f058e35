//! Change event envelope
//!
//! The record handed to the sink for every row change. Field names are a wire
//! contract:
//!
//! ```text
//! { "payload": {
//!     "before": {...} | null, "after": {...} | null,
//!     "source": { "version", "connector_name", "table", "schema", "db_name",
//!                 "lsn", "tx_id", "commit_time_us", "is_snapshot" },
//!     "op": "c" | "r" | "u" | "d" | "t",
//!     "ts_u_sec": <int64>,
//!     "column_types": { "<col>": { "oid", "name", "format", "unknown"? } }
//! } }
//! ```
//!
//! ## Transaction Metadata
//!
//! Envelopes may carry the transaction block assigned by the replication
//! layer. `total_order` is global across the transaction and
//! `data_collection_order` counts per table, which keeps cross-table ordering
//! recoverable without splitting delivery into per-table channels:
//!
//! | Table         | total_order | data_collection_order |
//! |---------------|-------------|-----------------------|
//! | public.users  | 1           | 1                     |
//! | public.orders | 2           | 1                     |
//! | public.orders | 3           | 2                     |
//! | public.users  | 4           | 2                     |

use crate::common::{Result, Row};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Version tag stamped into every envelope's source block.
pub const CONNECTOR_VERSION: &str = "0.0.1";

/// Format tag marking an unchanged-TOAST placeholder value.
pub const FORMAT_TOAST_PLACEHOLDER: &str = "toast_placeholder";

/// Column name to type provenance.
pub type ColumnTypes = BTreeMap<String, ColumnTypeMetadata>;

/// CDC operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CdcOp {
    /// Row inserted
    #[serde(rename = "c")]
    Insert,
    /// Row read during the initial snapshot
    #[serde(rename = "r")]
    Snapshot,
    /// Row updated
    #[serde(rename = "u")]
    Update,
    /// Row deleted
    #[serde(rename = "d")]
    Delete,
    /// Table truncated
    #[serde(rename = "t")]
    Truncate,
}

impl CdcOp {
    /// Debezium-style operation code.
    pub fn code(&self) -> &'static str {
        match self {
            CdcOp::Insert => "c",
            CdcOp::Snapshot => "r",
            CdcOp::Update => "u",
            CdcOp::Delete => "d",
            CdcOp::Truncate => "t",
        }
    }

    /// Check if this carries a row image (everything but truncate)
    pub fn is_dml(&self) -> bool {
        !matches!(self, CdcOp::Truncate)
    }
}

impl std::fmt::Display for CdcOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CdcOp::Insert => write!(f, "INSERT"),
            CdcOp::Snapshot => write!(f, "SNAPSHOT"),
            CdcOp::Update => write!(f, "UPDATE"),
            CdcOp::Delete => write!(f, "DELETE"),
            CdcOp::Truncate => write!(f, "TRUNCATE"),
        }
    }
}

/// PostgreSQL type identity of a decoded column.
///
/// Lets readers re-parse values that were stringified for JSON safety, e.g.
/// an int8 beyond 2^53 arrives as a string with `oid = 20`.
///
/// Wire form: `format` is always present and `""` when untagged; `unknown`
/// appears only when true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeMetadata {
    /// Type OID
    pub oid: u32,
    /// Type name (`int4`, `text`, ...)
    pub name: String,
    /// Value format tag, e.g. [`FORMAT_TOAST_PLACEHOLDER`]
    #[serde(
        default,
        serialize_with = "serialize_format",
        deserialize_with = "deserialize_format"
    )]
    pub format: Option<String>,
    /// OID is not in the built-in type table
    #[serde(default, skip_serializing_if = "is_false")]
    pub unknown: bool,
}

fn serialize_format<S: Serializer>(
    format: &Option<String>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(format.as_deref().unwrap_or(""))
}

fn deserialize_format<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    let format = Option::<String>::deserialize(d)?;
    Ok(format.filter(|f| !f.is_empty()))
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ColumnTypeMetadata {
    /// Create metadata for a type OID.
    pub fn new(oid: u32, name: impl Into<String>) -> Self {
        Self {
            oid,
            name: name.into(),
            format: None,
            unknown: false,
        }
    }

    /// Set the format tag.
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Flag the type as unknown.
    pub fn with_unknown(mut self, unknown: bool) -> Self {
        self.unknown = unknown;
        self
    }

    /// Check if the value is an unchanged-TOAST placeholder.
    pub fn is_toast_placeholder(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_TOAST_PLACEHOLDER)
    }
}

/// Where a change came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Connector version tag
    pub version: String,
    /// Configured connector name
    pub connector_name: String,
    /// Table name
    pub table: String,
    /// Schema name
    pub schema: String,
    /// Database name
    pub db_name: String,
    /// WAL position of the change
    pub lsn: u64,
    /// Transaction id
    pub tx_id: u64,
    /// Commit time (Unix epoch micros)
    pub commit_time_us: i64,
    /// `"true"` for initial-snapshot reads, `"false"` otherwise
    pub is_snapshot: String,
}

/// Transaction ordering metadata assigned by the replication layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Transaction ID
    pub id: String,
    /// Position of the event within the whole transaction
    pub total_order: u64,
    /// Position of the event among the transaction's events for this table
    pub data_collection_order: u64,
}

impl TransactionInfo {
    /// Create new transaction info.
    pub fn new(id: impl Into<String>, total_order: u64, data_collection_order: u64) -> Self {
        Self {
            id: id.into(),
            total_order,
            data_collection_order,
        }
    }
}

/// Envelope body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvelopePayload {
    /// Previous row state (update/delete)
    pub before: Option<Row>,
    /// Current row state (insert/update)
    pub after: Option<Row>,
    /// Source provenance
    pub source: SourceMetadata,
    /// Operation type
    pub op: CdcOp,
    /// When the connector built the envelope (Unix epoch micros)
    pub ts_u_sec: i64,
    /// Per-column type identity (absent for truncate or when empty)
    #[serde(skip_serializing_if = "no_column_types")]
    pub column_types: Option<ColumnTypes>,
    /// Transaction ordering (when supplied by the replication layer)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionInfo>,
}

fn no_column_types(types: &Option<ColumnTypes>) -> bool {
    types.as_ref().is_none_or(|t| t.is_empty())
}

/// A change event, built once per logical change and handed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub payload: EnvelopePayload,
}

impl Envelope {
    /// Attach transaction metadata to this envelope.
    pub fn with_transaction(mut self, txn: TransactionInfo) -> Self {
        self.payload.transaction = Some(txn);
        self
    }

    /// Operation type.
    pub fn op(&self) -> CdcOp {
        self.payload.op
    }

    /// `schema.table` of the changed relation.
    pub fn qualified_table(&self) -> String {
        format!(
            "{}.{}",
            self.payload.source.schema, self.payload.source.table
        )
    }

    /// Serialize for the sink.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
