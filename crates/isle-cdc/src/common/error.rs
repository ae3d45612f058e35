//! Error types for CDC operations
//!
//! Every fatal error names the relation, column or transform involved so the
//! caller can decide whether to halt the stream or skip the affected event.
//! Value-level parse failures never surface here: the decoder recovers them
//! locally by keeping the raw text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error categories for metrics and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Row data disagrees with the cached relation metadata
    Schema,
    /// Wire data violates a protocol assumption
    Protocol,
    /// Invalid settings, caught before events are processed
    Configuration,
    /// Envelope could not be serialized
    Serialization,
}

/// Row image a primary key check ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowImage {
    /// A single decoded row
    Row,
    /// The old image of an update
    Before,
    /// The new image of an update
    After,
}

impl fmt::Display for RowImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowImage::Row => write!(f, "row"),
            RowImage::Before => write!(f, "before row"),
            RowImage::After => write!(f, "after row"),
        }
    }
}

/// CDC-specific errors
#[derive(Error, Debug)]
pub enum CdcError {
    /// Row arrived for a relation with no cached metadata
    #[error("unknown relation OID {0}")]
    UnknownRelation(u32),

    /// Tuple width differs from the cached relation (schema drift)
    #[error("column count mismatch for {table}: got {got}, expected {expected}")]
    ColumnCountMismatch {
        table: String,
        got: usize,
        expected: usize,
    },

    /// Primary key column absent from a row image
    #[error("missing primary key column {column} in {image}")]
    MissingPrimaryKey { column: String, image: RowImage },

    /// Primary key column present but null
    #[error("primary key column {column} is null in {image}")]
    NullPrimaryKey { column: String, image: RowImage },

    /// Relation update rejected because the column filter would drop a key column
    #[error("column_exclude matches primary key column {column}")]
    PrimaryKeyExcluded { column: String },

    /// Binary-format tuple data (unsupported by design)
    #[error("binary tuple data is not supported for {column} (oid={type_oid})")]
    BinaryTupleData { column: String, type_oid: u32 },

    /// Unrecognized tuple data marker
    #[error("unknown tuple data type {marker:?} for {column} (oid={type_oid})")]
    UnknownTupleFormat {
        marker: char,
        column: String,
        type_oid: u32,
    },

    /// Malformed wire data
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CdcError {
    /// Create a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Get the error category for metrics and alerting.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownRelation(_)
            | Self::ColumnCountMismatch { .. }
            | Self::MissingPrimaryKey { .. }
            | Self::NullPrimaryKey { .. }
            | Self::PrimaryKeyExcluded { .. } => ErrorCategory::Schema,
            Self::BinaryTupleData { .. } | Self::UnknownTupleFormat { .. } | Self::Protocol(_) => {
                ErrorCategory::Protocol
            }
            Self::Config(_) | Self::Pattern(_) => ErrorCategory::Configuration,
            Self::Json(_) => ErrorCategory::Serialization,
        }
    }

    /// Get a metric-safe error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownRelation(_) => "unknown_relation",
            Self::ColumnCountMismatch { .. } => "column_count_mismatch",
            Self::MissingPrimaryKey { .. } => "missing_primary_key",
            Self::NullPrimaryKey { .. } => "null_primary_key",
            Self::PrimaryKeyExcluded { .. } => "primary_key_excluded",
            Self::BinaryTupleData { .. } => "binary_tuple_data",
            Self::UnknownTupleFormat { .. } => "unknown_tuple_format",
            Self::Protocol(_) => "protocol_error",
            Self::Config(_) => "config_error",
            Self::Pattern(_) => "invalid_pattern",
            Self::Json(_) => "json_error",
        }
    }
}

/// Result type for CDC operations
pub type Result<T> = std::result::Result<T, CdcError>;
