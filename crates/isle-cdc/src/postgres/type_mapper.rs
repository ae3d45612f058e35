//! PostgreSQL type mapper
//!
//! Maps built-in type OIDs to names and decodes text-format (`typoutput`)
//! values into JSON-safe [`ColumnValue`]s.
//!
//! | Type                               | Decoded as                                  |
//! |------------------------------------|---------------------------------------------|
//! | `bool`                             | `Bool` (`t`/`true`/`TRUE` are true)         |
//! | `int2`, `int4`                     | `Int`                                       |
//! | `int8`                             | `Int` within ±2^53, otherwise `String`      |
//! | `float4`, `float8`                 | `Float32`/`Float`, NaN and ±Infinity as text|
//! | `oid`, `xid`, `cid`                | `UInt`                                      |
//! | `json`, `jsonb`                    | `Json` (raw text, not re-encoded)           |
//! | everything else                    | `String`, verbatim                          |
//!
//! Reference: <https://www.postgresql.org/docs/current/datatype.html>

use crate::common::ColumnValue;
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

pub const OID_BOOL: u32 = 16;
pub const OID_BYTEA: u32 = 17;
pub const OID_CHAR: u32 = 18;
pub const OID_NAME: u32 = 19;
pub const OID_INT8: u32 = 20;
pub const OID_INT2: u32 = 21;
pub const OID_INT4: u32 = 23;
pub const OID_TEXT: u32 = 25;
pub const OID_OID: u32 = 26;
pub const OID_XID: u32 = 28;
pub const OID_CID: u32 = 29;
pub const OID_JSON: u32 = 114;
pub const OID_XML: u32 = 142;
pub const OID_FLOAT4: u32 = 700;
pub const OID_FLOAT8: u32 = 701;
pub const OID_MACADDR8: u32 = 774;
pub const OID_MONEY: u32 = 790;
pub const OID_MACADDR: u32 = 829;
pub const OID_INET: u32 = 869;
pub const OID_BPCHAR: u32 = 1042;
pub const OID_VARCHAR: u32 = 1043;
pub const OID_DATE: u32 = 1082;
pub const OID_TIME: u32 = 1083;
pub const OID_TIMESTAMP: u32 = 1114;
pub const OID_TIMESTAMPTZ: u32 = 1184;
pub const OID_INTERVAL: u32 = 1186;
pub const OID_TIMETZ: u32 = 1266;
pub const OID_BIT: u32 = 1560;
pub const OID_VARBIT: u32 = 1562;
pub const OID_NUMERIC: u32 = 1700;
pub const OID_UUID: u32 = 2950;
pub const OID_PG_LSN: u32 = 3220;
pub const OID_JSONB: u32 = 3802;

/// Largest integer magnitude a JSON reader decoding into `f64` keeps exactly.
pub const MAX_SAFE_JSON_INT: i64 = 1 << 53;

/// Name reported for OIDs outside the built-in table.
pub const UNKNOWN_TYPE_NAME: &str = "unknown";

/// Why a text value did not parse under its declared type.
#[derive(Debug, Error)]
pub enum TextDecodeError {
    #[error("invalid integer: {0}")]
    Int(#[from] ParseIntError),

    #[error("invalid float: {0}")]
    Float(#[from] ParseFloatError),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

/// Maps PostgreSQL OID types to names and decoded values
pub struct PostgresTypeMapper;

impl PostgresTypeMapper {
    /// Built-in type name for an OID (array types as `elem[]`).
    pub fn type_name(type_oid: u32) -> Option<&'static str> {
        let name = match type_oid {
            OID_BOOL => "bool",
            OID_BYTEA => "bytea",
            OID_CHAR => "char",
            OID_NAME => "name",
            OID_INT8 => "int8",
            OID_INT2 => "int2",
            OID_INT4 => "int4",
            OID_TEXT => "text",
            OID_OID => "oid",
            OID_XID => "xid",
            OID_CID => "cid",
            OID_JSON => "json",
            OID_XML => "xml",
            OID_FLOAT4 => "float4",
            OID_FLOAT8 => "float8",
            OID_MACADDR8 => "macaddr8",
            OID_MONEY => "money",
            OID_MACADDR => "macaddr",
            OID_INET => "inet",
            OID_BPCHAR => "bpchar",
            OID_VARCHAR => "varchar",
            OID_DATE => "date",
            OID_TIME => "time",
            OID_TIMESTAMP => "timestamp",
            OID_TIMESTAMPTZ => "timestamptz",
            OID_INTERVAL => "interval",
            OID_TIMETZ => "timetz",
            OID_BIT => "bit",
            OID_VARBIT => "varbit",
            OID_NUMERIC => "numeric",
            OID_UUID => "uuid",
            OID_PG_LSN => "pg_lsn",
            OID_JSONB => "jsonb",

            // Arrays (`_elem` in pg_type)
            1000 => "bool[]",
            1001 => "bytea[]",
            1005 => "int2[]",
            1007 => "int4[]",
            1009 => "text[]",
            1014 => "bpchar[]",
            1015 => "varchar[]",
            1016 => "int8[]",
            1021 => "float4[]",
            1022 => "float8[]",
            1041 => "inet[]",
            1115 => "timestamp[]",
            1182 => "date[]",
            1185 => "timestamptz[]",
            1231 => "numeric[]",
            2951 => "uuid[]",
            3807 => "jsonb[]",

            _ => return None,
        };
        Some(name)
    }

    /// Type name, or `"unknown"`.
    pub fn type_name_or_unknown(type_oid: u32) -> &'static str {
        Self::type_name(type_oid).unwrap_or(UNKNOWN_TYPE_NAME)
    }

    /// Check if the OID is in the built-in table.
    pub fn is_known(type_oid: u32) -> bool {
        Self::type_name(type_oid).is_some()
    }

    /// Check if values of this type are variable-length and may be stored
    /// out of line (TOAST). Unknown OIDs are assumed fixed-width.
    pub fn is_toastable(type_oid: u32) -> bool {
        match type_oid {
            OID_BYTEA | OID_TEXT | OID_JSON | OID_XML | OID_BPCHAR | OID_VARCHAR | OID_BIT
            | OID_VARBIT | OID_NUMERIC | OID_JSONB => true,
            // every array type is varlena
            _ => Self::type_name(type_oid).is_some_and(|name| name.ends_with("[]")),
        }
    }

    /// Decode a text-format value.
    ///
    /// On error the caller is expected to keep the raw text.
    pub fn decode_text(data: &[u8], type_oid: u32) -> Result<ColumnValue, TextDecodeError> {
        let s = std::str::from_utf8(data)?;

        let value = match type_oid {
            OID_BOOL => ColumnValue::Bool(matches!(s, "t" | "true" | "TRUE")),

            OID_INT2 => ColumnValue::Int(i64::from(s.parse::<i16>()?)),
            OID_INT4 => ColumnValue::Int(i64::from(s.parse::<i32>()?)),
            OID_INT8 => {
                let v = s.parse::<i64>()?;
                if (-MAX_SAFE_JSON_INT..=MAX_SAFE_JSON_INT).contains(&v) {
                    ColumnValue::Int(v)
                } else {
                    // readers re-parse using column_types.oid
                    ColumnValue::String(s.to_string())
                }
            }

            OID_FLOAT4 => {
                let v = s.parse::<f32>()?;
                if v.is_finite() {
                    ColumnValue::Float32(v)
                } else {
                    ColumnValue::String(s.to_string())
                }
            }
            OID_FLOAT8 => {
                let v = s.parse::<f64>()?;
                if v.is_finite() {
                    ColumnValue::Float(v)
                } else {
                    ColumnValue::String(s.to_string())
                }
            }

            OID_OID | OID_XID | OID_CID => ColumnValue::UInt(s.parse::<u32>()?),

            OID_JSON | OID_JSONB => ColumnValue::json(s)?,

            // numeric, money, text-like, bytea, temporal, network, pg_lsn
            // and unknown OIDs are kept verbatim
            _ => ColumnValue::String(s.to_string()),
        };
        Ok(value)
    }
}
