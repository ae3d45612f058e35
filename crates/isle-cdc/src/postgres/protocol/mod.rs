//! pgoutput wire format
//!
//! Tuple cells and the parsers the replication layer uses to feed them to
//! [`TupleDecoder`](crate::postgres::TupleDecoder).

mod decoder;
mod message;

pub use decoder::*;
pub use message::*;
