//! Decoded column values
//!
//! Every decoded cell is one of a closed set of JSON-safe variants, so
//! consumers match exhaustively instead of probing dynamic types.

use serde::{Serialize, Serializer};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;

/// A decoded row image: column name to value.
pub type Row = BTreeMap<String, ColumnValue>;

/// A decoded column value.
#[derive(Debug, Clone)]
pub enum ColumnValue {
    /// SQL NULL
    Null,
    /// boolean
    Bool(bool),
    /// int2, int4 and int8 within ±2^53
    Int(i64),
    /// oid, xid and cid
    UInt(u32),
    /// finite float4
    Float32(f32),
    /// finite float8
    Float(f64),
    /// Verbatim text (numeric, temporal, network, out-of-range int8, ...)
    String(String),
    /// json/jsonb text, embedded into the envelope as-is
    Json(Box<RawValue>),
}

impl ColumnValue {
    /// Wrap raw JSON text without re-encoding it.
    ///
    /// Fails if the text is not valid JSON.
    pub fn json(text: impl Into<String>) -> Result<Self, serde_json::Error> {
        RawValue::from_string(text.into()).map(ColumnValue::Json)
    }

    /// Check for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, ColumnValue::Null)
    }

    /// Borrow the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ColumnValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ColumnValue::Int(v) => Some(*v),
            ColumnValue::UInt(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ColumnValue::Null => "null",
            ColumnValue::Bool(_) => "bool",
            ColumnValue::Int(_) => "int",
            ColumnValue::UInt(_) => "uint",
            ColumnValue::Float32(_) => "float32",
            ColumnValue::Float(_) => "float",
            ColumnValue::String(_) => "string",
            ColumnValue::Json(_) => "json",
        }
    }
}

impl PartialEq for ColumnValue {
    fn eq(&self, other: &Self) -> bool {
        use ColumnValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (UInt(a), UInt(b)) => a == b,
            (Float32(a), Float32(b)) => a == b,
            (Float(a), Float(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Json(a), Json(b)) => a.get() == b.get(),
            _ => false,
        }
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Null => write!(f, "null"),
            ColumnValue::Bool(v) => write!(f, "{}", v),
            ColumnValue::Int(v) => write!(f, "{}", v),
            ColumnValue::UInt(v) => write!(f, "{}", v),
            ColumnValue::Float32(v) => write!(f, "{}", v),
            ColumnValue::Float(v) => write!(f, "{}", v),
            ColumnValue::String(v) => f.write_str(v),
            ColumnValue::Json(v) => f.write_str(v.get()),
        }
    }
}

impl Serialize for ColumnValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ColumnValue::Null => serializer.serialize_unit(),
            ColumnValue::Bool(v) => serializer.serialize_bool(*v),
            ColumnValue::Int(v) => serializer.serialize_i64(*v),
            ColumnValue::UInt(v) => serializer.serialize_u32(*v),
            ColumnValue::Float32(v) => serializer.serialize_f32(*v),
            ColumnValue::Float(v) => serializer.serialize_f64(*v),
            ColumnValue::String(v) => serializer.serialize_str(v),
            ColumnValue::Json(v) => v.serialize(serializer),
        }
    }
}

impl From<bool> for ColumnValue {
    fn from(v: bool) -> Self {
        ColumnValue::Bool(v)
    }
}

impl From<i64> for ColumnValue {
    fn from(v: i64) -> Self {
        ColumnValue::Int(v)
    }
}

impl From<u32> for ColumnValue {
    fn from(v: u32) -> Self {
        ColumnValue::UInt(v)
    }
}

impl From<f64> for ColumnValue {
    fn from(v: f64) -> Self {
        ColumnValue::Float(v)
    }
}

impl From<&str> for ColumnValue {
    fn from(v: &str) -> Self {
        ColumnValue::String(v.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(v: String) -> Self {
        ColumnValue::String(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_scalars() {
        assert_eq!(serde_json::to_value(ColumnValue::Null).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(ColumnValue::Bool(true)).unwrap(), json!(true));
        assert_eq!(serde_json::to_value(ColumnValue::Int(-42)).unwrap(), json!(-42));
        assert_eq!(serde_json::to_value(ColumnValue::UInt(7)).unwrap(), json!(7));
        assert_eq!(serde_json::to_value(ColumnValue::Float(1.25)).unwrap(), json!(1.25));
        assert_eq!(
            serde_json::to_string(&ColumnValue::Float32(1.5)).unwrap(),
            "1.5"
        );
        assert_eq!(
            serde_json::to_value(ColumnValue::from("12.50")).unwrap(),
            json!("12.50")
        );
    }

    #[test]
    fn test_json_embedded_verbatim() {
        let value = ColumnValue::json(r#"{"b": 1,  "a": [1, 2]}"#).unwrap();
        let encoded = serde_json::to_string(&value).unwrap();
        assert_eq!(encoded, r#"{"b": 1,  "a": [1, 2]}"#);
        assert!(ColumnValue::json("{not json").is_err());
    }

    #[test]
    fn test_display_rendering() {
        assert_eq!(ColumnValue::Int(5).to_string(), "5");
        assert_eq!(ColumnValue::from("abc").to_string(), "abc");
        assert_eq!(ColumnValue::Bool(false).to_string(), "false");
        assert_eq!(ColumnValue::json("[1]").unwrap().to_string(), "[1]");
        assert_eq!(ColumnValue::Null.to_string(), "null");
    }

    #[test]
    fn test_equality_is_variant_strict() {
        assert_eq!(ColumnValue::Int(1), ColumnValue::Int(1));
        assert_ne!(ColumnValue::Int(1), ColumnValue::UInt(1));
        assert_ne!(ColumnValue::Int(1), ColumnValue::from("1"));
        assert_eq!(
            ColumnValue::json("[1]").unwrap(),
            ColumnValue::json("[1]").unwrap()
        );
    }

    #[test]
    fn test_accessors() {
        assert!(ColumnValue::Null.is_null());
        assert_eq!(ColumnValue::from("x").as_str(), Some("x"));
        assert_eq!(ColumnValue::UInt(3).as_i64(), Some(3));
        assert_eq!(ColumnValue::Float(1.0).as_i64(), None);
        assert_eq!(ColumnValue::Float32(1.0).kind(), "float32");
    }
}
