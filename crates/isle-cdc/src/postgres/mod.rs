//! PostgreSQL logical replication decoding
//!
//! Supports:
//! - pgoutput TupleData and Relation message parsing
//! - Text-format value decoding for 30+ built-in types
//! - Relation layout caching with primary-key safety checks
//! - Envelope construction with column redaction
//!
//! # Architecture
//!
//! ```text
//! Relation msg → RelationCache
//!                     │
//! TupleData ──→ TupleDecoder ──→ EnvelopeBuilder ──→ Envelope (JSON)
//!                  (Row + ColumnTypes)   (TransformEngine)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use chrono::Utc;
//! use isle_cdc::common::ConnectorConfig;
//! use isle_cdc::postgres::{
//!     Column, EnvelopeBuilder, RelationCache, RelationInfo, SourcePosition, TupleColumn,
//!     TupleDecoder, OID_INT4, OID_TEXT,
//! };
//!
//! # fn main() -> isle_cdc::Result<()> {
//! let config = ConnectorConfig::default();
//! let relations = Arc::new(RelationCache::new());
//! // installs config.tables as the filter relation updates are checked against
//! let decoder = TupleDecoder::new(relations.clone(), &config);
//! relations.update(
//!     16384,
//!     RelationInfo::new(16384, "public", "users", vec![
//!         Column::primary_key("id", OID_INT4),
//!         Column::new("email", OID_TEXT),
//!     ]),
//! )?;
//!
//! let builder = EnvelopeBuilder::from_config(&config, relations.patterns().clone());
//!
//! let decoded = decoder.decode_tuple(16384, &[TupleColumn::from("1"), TupleColumn::from("a@b.c")])?;
//! let rel = relations.get(16384).expect("relation was just published");
//! let envelope = builder.build_insert(
//!     &rel,
//!     &decoded.row,
//!     decoded.column_types,
//!     SourcePosition::new(0x16B3748, 771, Utc::now()),
//!     false,
//! );
//! let bytes = envelope.to_json_bytes()?;
//! # assert!(!bytes.is_empty());
//! # Ok(())
//! # }
//! ```

mod decoder;
mod envelope;
mod protocol;
mod relation;
mod type_mapper;

pub use decoder::*;
pub use envelope::*;
pub use protocol::*;
pub use relation::*;
pub use type_mapper::*;
