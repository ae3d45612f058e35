//! # isle-cdc - PostgreSQL Change Data Capture core
//!
//! Decodes pgoutput tuple data into JSON-safe rows, redacts configured
//! columns and packages every change into a stable envelope for the sink.
//!
//! ## Features
//!
//! - `postgres` (default) - pgoutput decoding, relation cache, envelope builder
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Relation msg │   │  TupleData   │   │ LSN/xid/time │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        ▼                  ▼                  │
//! ┌──────────────┐   ┌──────────────┐          │
//! │RelationCache │──▶│ TupleDecoder │          │
//! └──────────────┘   └──────┬───────┘          │
//!                           ▼                  ▼
//! ┌──────────────────────────────────────────────────────┐
//! │        EnvelopeBuilder (+ TransformEngine)           │
//! └──────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────┐
//! │   Envelope { payload: before, after, source, op }    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The replication connection, transaction ordering and the sink live outside
//! this crate. Everything here is synchronous and safe to call from many
//! threads; the only shared state is the [`PatternCache`] and the
//! [`postgres::RelationCache`].
//!
//! ## Public API Organization
//!
//! ### Tier 1: Core Types (crate root)
//! Envelope model, decoded values, errors and configuration.
//!
//! ### Tier 2: Feature Types (crate root)
//! Filtering and column transforms.
//!
//! ### Tier 3: Advanced Types (`common` and `postgres` modules)
//! Pattern cache internals, wire parsers and OID constants.

pub mod common;

// =============================================================================
// TIER 1: Core Types
// =============================================================================

pub use common::{
    // Error handling
    CdcError,
    // Envelope model
    CdcOp,
    ColumnTypeMetadata,
    ColumnTypes,
    // Decoded values
    ColumnValue,
    // Configuration
    ConnectionConfig,
    ConnectorConfig,
    Envelope,
    EnvelopePayload,
    ErrorCategory,
    Result,
    Row,
    SourceMetadata,
    ToastConfig,
    TransactionInfo,
};

// =============================================================================
// TIER 2: Filtering and Transforms
// =============================================================================

pub use common::{CdcFilter, FilterConfig};
pub use common::{ColumnTransform, HashAlgorithm, TransformEngine, TransformKind};

// =============================================================================
// TIER 3: Advanced Types - Available via `common::` / `postgres::`
// =============================================================================
//
//   - common::PatternCache
//   - common::hash_value
//   - postgres::parse_tuple_data, postgres::parse_relation
//   - postgres::PostgresTypeMapper, postgres::OID_* constants

pub use common::PatternCache;

#[cfg(feature = "postgres")]
pub mod postgres;
