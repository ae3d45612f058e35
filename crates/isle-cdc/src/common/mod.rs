//! # Common CDC Types
//!
//! Database-agnostic building blocks:
//!
//! - [`PatternCache`] - Shared compiled-regex cache
//! - [`CdcFilter`] - Schema/table/column include and exclude rules
//! - [`ColumnValue`] - Tagged, JSON-safe decoded value
//! - [`Envelope`] - Change event emitted to the sink
//! - [`TransformEngine`] - Column redaction (mask/hash/truncate)
//! - [`ConnectorConfig`] - Configuration surface
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   Common Module                      │
//! ├──────────────────────────────────────────────────────┤
//! │  PatternCache    ←─── one compiled Regex per pattern │
//! │  CdcFilter       ←─── include/exclude via patterns   │
//! │  TransformEngine ←─── PII redaction via patterns     │
//! │  ColumnValue     ←─── decoded cell                   │
//! │  Envelope        ←─── before/after/source/op         │
//! │  ConnectorConfig ←─── transforms, tables, toast      │
//! └──────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod event;
mod filter;
mod pattern;
mod transform;
mod value;

pub use config::*;
pub use error::*;
pub use event::*;
pub use filter::*;
pub use pattern::*;
pub use transform::*;
pub use value::*;
