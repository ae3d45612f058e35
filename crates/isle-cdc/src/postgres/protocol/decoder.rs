//! pgoutput wire parsing
//!
//! Adapters for the replication layer: turn the TupleData and Relation parts
//! of a pgoutput message into [`TupleColumn`]s and [`RelationInfo`]. Every
//! read is bounds-checked; truncated input is a protocol error.

use super::message::*;
use crate::common::{CdcError, Result};
use crate::postgres::{Column, RelationInfo, ReplicaIdentity};
use bytes::{Buf, Bytes};
use chrono::{DateTime, Utc};

/// Relation column flag: part of the replica identity key.
pub const COLUMN_FLAG_KEY: u8 = 1;

/// Seconds between the Unix epoch and the PostgreSQL epoch (2000-01-01).
const PG_EPOCH_OFFSET_SECS: i64 = 946_684_800;

fn ensure(buf: &Bytes, n: usize, what: &str) -> Result<()> {
    if buf.remaining() < n {
        return Err(CdcError::protocol(format!(
            "truncated {}: need {} bytes, have {}",
            what,
            n,
            buf.remaining()
        )));
    }
    Ok(())
}

fn read_u8(buf: &mut Bytes, what: &str) -> Result<u8> {
    ensure(buf, 1, what)?;
    Ok(buf.get_u8())
}

fn read_u16(buf: &mut Bytes, what: &str) -> Result<u16> {
    ensure(buf, 2, what)?;
    Ok(buf.get_u16())
}

fn read_u32(buf: &mut Bytes, what: &str) -> Result<u32> {
    ensure(buf, 4, what)?;
    Ok(buf.get_u32())
}

fn read_string(buf: &mut Bytes, what: &str) -> Result<String> {
    let n = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| CdcError::protocol(format!("unterminated {}", what)))?;
    let s_bytes = buf.split_to(n);
    buf.advance(1); // skip null
    std::str::from_utf8(&s_bytes)
        .map(str::to_string)
        .map_err(|e| CdcError::protocol(format!("invalid utf-8 in {}: {}", what, e)))
}

/// Parse a TupleData block: `u16` column count, then per column a marker
/// byte and, for text/binary, a `u32` length and payload.
///
/// Markers are not validated here; the tuple decoder rejects the ones it
/// does not support with table and column context.
pub fn parse_tuple_data(buf: &mut Bytes) -> Result<Vec<TupleColumn>> {
    let num_cols = read_u16(buf, "tuple column count")?;
    let mut columns = Vec::with_capacity(num_cols as usize);

    for _ in 0..num_cols {
        let marker = read_u8(buf, "tuple column marker")?;
        let data = match marker {
            MARKER_TEXT | MARKER_BINARY => {
                let len = read_u32(buf, "tuple column length")? as usize;
                ensure(buf, len, "tuple column data")?;
                buf.split_to(len)
            }
            _ => Bytes::new(),
        };
        columns.push(TupleColumn { marker, data });
    }

    Ok(columns)
}

/// Parse the body of a Relation (`R`) message, after the type byte.
///
/// The key flag maps to [`Column::is_primary_key`]; type names and the
/// toastable flag come from the built-in OID table.
pub fn parse_relation(buf: &mut Bytes) -> Result<RelationInfo> {
    let id = read_u32(buf, "relation id")?;
    let namespace = read_string(buf, "relation namespace")?;
    let name = read_string(buf, "relation name")?;
    let replica_identity = ReplicaIdentity::from_byte(read_u8(buf, "replica identity")?);
    let num_columns = read_u16(buf, "relation column count")?;

    let mut columns = Vec::with_capacity(num_columns as usize);
    for _ in 0..num_columns {
        let flags = read_u8(buf, "column flags")?;
        let col_name = read_string(buf, "column name")?;
        let type_oid = read_u32(buf, "column type")?;
        let _type_mode = read_u32(buf, "column type modifier")?;
        let column = if flags & COLUMN_FLAG_KEY != 0 {
            Column::primary_key(col_name, type_oid)
        } else {
            Column::new(col_name, type_oid)
        };
        columns.push(column);
    }

    // pgoutput uses "" for pg_catalog
    let schema = if namespace.is_empty() {
        "pg_catalog".to_string()
    } else {
        namespace
    };
    Ok(RelationInfo::new(id, schema, name, columns).with_replica_identity(replica_identity))
}

/// Convert a pgoutput timestamp (micros since 2000-01-01 UTC).
pub fn pg_timestamp_to_utc(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros.checked_add(PG_EPOCH_OFFSET_SECS * 1_000_000)?)
}
