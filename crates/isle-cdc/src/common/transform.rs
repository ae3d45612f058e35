//! # Column Transforms (PII redaction)
//!
//! Column-level redaction applied to decoded rows before they are enveloped.
//!
//! | Type       | Effect                                                     |
//! |------------|------------------------------------------------------------|
//! | `mask`     | Replace with a run of `*` (`maskLength`, default 5)        |
//! | `hash`     | Hex digest (`sha256`/`sha512`), HMAC-keyed by `hashSalt`   |
//! | `truncate` | Keep the first `truncateChar` characters of string values |
//!
//! Each transform's `columns` pattern is a regular expression matched against
//! `schema.table.column`.
//!
//! ## Usage
//!
//! ```rust
//! use isle_cdc::common::{ColumnTransform, ColumnValue, Row, TransformEngine};
//!
//! let engine = TransformEngine::from_transforms(vec![
//!     ColumnTransform::mask(r"^public\.users\.email$"),
//! ]);
//!
//! let mut row = Row::new();
//! row.insert("email".into(), ColumnValue::from("alice@example.com"));
//!
//! let redacted = engine.apply("public", "users", &row);
//! assert_eq!(redacted["email"], ColumnValue::from("*****"));
//! // the input row is untouched
//! assert_eq!(row["email"], ColumnValue::from("alice@example.com"));
//! ```

use crate::common::{CdcError, ColumnValue, PatternCache, Result, Row};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use tracing::{error, warn};

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Mask length used when none (or a non-positive one) is configured.
pub const DEFAULT_MASK_LENGTH: usize = 5;

/// Redaction type of a [`ColumnTransform`].
///
/// Unrecognized names are kept as [`TransformKind::Unknown`] so configuration
/// validation can report them instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransformKind {
    /// Replace with asterisks
    Mask,
    /// Replace with a hex digest
    Hash,
    /// Shorten string values
    Truncate,
    /// Anything else
    Unknown(String),
}

impl TransformKind {
    /// Configuration name of the type.
    pub fn as_str(&self) -> &str {
        match self {
            TransformKind::Mask => "mask",
            TransformKind::Hash => "hash",
            TransformKind::Truncate => "truncate",
            TransformKind::Unknown(s) => s,
        }
    }

    /// Check if this is one of the supported types.
    pub fn is_known(&self) -> bool {
        !matches!(self, TransformKind::Unknown(_))
    }
}

impl From<String> for TransformKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "mask" => TransformKind::Mask,
            "hash" => TransformKind::Hash,
            "truncate" => TransformKind::Truncate,
            _ => TransformKind::Unknown(s),
        }
    }
}

impl From<TransformKind> for String {
    fn from(kind: TransformKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Digest used by the `hash` transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    /// Parse a configured name (case-insensitive); empty means SHA-256.
    ///
    /// Unrecognized names fall back to SHA-256 with a warning.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "" | "sha256" => HashAlgorithm::Sha256,
            "sha512" => HashAlgorithm::Sha512,
            other => {
                warn!(
                    algorithm = other,
                    "unknown hash algorithm, falling back to sha256"
                );
                HashAlgorithm::Sha256
            }
        }
    }
}

fn is_zero(v: &i32) -> bool {
    *v == 0
}

/// A redaction rule for every column matching `columns`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnTransform {
    /// Regex over `schema.table.column`
    pub columns: String,

    /// `mask`, `hash` or `truncate`
    #[serde(rename = "type")]
    pub kind: TransformKind,

    /// Asterisk count for `mask` (non-positive = default)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub mask_length: i32,

    /// `sha256` (default) or `sha512` for `hash`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash_algorithm: String,

    /// HMAC key for `hash`; plain digest when empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash_salt: String,

    /// Character limit for `truncate` (non-positive = no-op)
    #[serde(default, skip_serializing_if = "is_zero")]
    pub truncate_char: i32,
}

impl fmt::Debug for ColumnTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let salt = if self.hash_salt.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("ColumnTransform")
            .field("columns", &self.columns)
            .field("kind", &self.kind)
            .field("mask_length", &self.mask_length)
            .field("hash_algorithm", &self.hash_algorithm)
            .field("hash_salt", &salt)
            .field("truncate_char", &self.truncate_char)
            .finish()
    }
}

impl ColumnTransform {
    fn with_kind(columns: impl Into<String>, kind: TransformKind) -> Self {
        Self {
            columns: columns.into(),
            kind,
            mask_length: 0,
            hash_algorithm: String::new(),
            hash_salt: String::new(),
            truncate_char: 0,
        }
    }

    /// Mask matching columns.
    pub fn mask(columns: impl Into<String>) -> Self {
        Self::with_kind(columns, TransformKind::Mask)
    }

    /// Hash matching columns.
    pub fn hash(columns: impl Into<String>) -> Self {
        Self::with_kind(columns, TransformKind::Hash)
    }

    /// Truncate matching string columns to `chars` characters.
    pub fn truncate(columns: impl Into<String>, chars: i32) -> Self {
        let mut t = Self::with_kind(columns, TransformKind::Truncate);
        t.truncate_char = chars;
        t
    }

    /// Set the mask length.
    pub fn with_mask_length(mut self, length: i32) -> Self {
        self.mask_length = length;
        self
    }

    /// Set the hash algorithm name.
    pub fn with_hash_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.hash_algorithm = algorithm.into();
        self
    }

    /// Set the HMAC salt.
    pub fn with_hash_salt(mut self, salt: impl Into<String>) -> Self {
        self.hash_salt = salt.into();
        self
    }

    /// Check the pattern compiles and the type is supported.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(CdcError::config("columns is empty for transform"));
        }
        if let Err(e) = regex::Regex::new(&self.columns) {
            return Err(CdcError::config(format!(
                "columns is invalid for transform {:?}: {}",
                self.columns, e
            )));
        }
        if !self.kind.is_known() {
            return Err(CdcError::config(format!(
                "invalid transform type: {}",
                self.kind
            )));
        }
        Ok(())
    }

    fn effective_mask_length(&self) -> usize {
        if self.mask_length > 0 {
            self.mask_length as usize
        } else {
            DEFAULT_MASK_LENGTH
        }
    }
}

/// Applies the configured transforms to decoded rows.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    transforms: Vec<ColumnTransform>,
    patterns: Arc<PatternCache>,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::from_transforms(Vec::new())
    }
}

impl TransformEngine {
    /// Create an engine that shares an existing pattern cache.
    pub fn new(transforms: Vec<ColumnTransform>, patterns: Arc<PatternCache>) -> Self {
        Self {
            transforms,
            patterns,
        }
    }

    /// Create an engine with its own pattern cache.
    pub fn from_transforms(transforms: Vec<ColumnTransform>) -> Self {
        Self::new(transforms, Arc::new(PatternCache::new()))
    }

    /// Check if no transform is configured.
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Configured transforms, in application order.
    pub fn transforms(&self) -> &[ColumnTransform] {
        &self.transforms
    }

    /// Return a redacted copy of `row`.
    ///
    /// Transforms run in configuration order; each one sees the output of the
    /// previous. Columns matched by an unknown transform type are left as-is
    /// and reported at error level.
    pub fn apply(&self, schema: &str, table: &str, row: &Row) -> Row {
        let mut out = row.clone();
        if self.transforms.is_empty() {
            return out;
        }

        for transform in &self.transforms {
            for (column, value) in out.iter_mut() {
                let full_name = format!("{}.{}.{}", schema, table, column);
                if !self.patterns.is_match(&transform.columns, &full_name) {
                    continue;
                }
                match &transform.kind {
                    TransformKind::Mask => {
                        *value = ColumnValue::String("*".repeat(transform.effective_mask_length()));
                    }
                    TransformKind::Hash => {
                        *value = ColumnValue::String(hash_value(
                            value,
                            HashAlgorithm::from_name(&transform.hash_algorithm),
                            &transform.hash_salt,
                        ));
                    }
                    TransformKind::Truncate => {
                        if let ColumnValue::String(s) = value {
                            truncate_chars(s, transform.truncate_char);
                        }
                    }
                    TransformKind::Unknown(kind) => {
                        error!(
                            transform_type = %kind,
                            column = %full_name,
                            "unknown transform type, skipping (possible PII leak)"
                        );
                    }
                }
            }
        }
        out
    }

    /// [`apply`](Self::apply) for an optional row image.
    pub fn apply_opt(&self, schema: &str, table: &str, row: Option<&Row>) -> Option<Row> {
        row.map(|r| self.apply(schema, table, r))
    }
}

/// Hex digest of a value.
///
/// The digest input is a fixed text rendering, kept stable so that equal
/// source values always produce equal digests:
///
/// | value | hashed as |
/// |---|---|
/// | NULL | `<nil>` |
/// | bool, integers, strings | `true`, `42`, the text itself |
/// | floats | shortest digits; exponent form (`1e+06`, `1e-05`) below 1e-4 or from 1e6 |
/// | JSON | byte list of the raw text, `[123 125]` for `{}` |
pub fn hash_value(value: &ColumnValue, algorithm: HashAlgorithm, salt: &str) -> String {
    let input = digest_input(value);

    if salt.is_empty() {
        return match algorithm {
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(input.as_bytes())),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(input.as_bytes())),
        };
    }

    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut mac = HmacSha256::new_from_slice(salt.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(input.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
        HashAlgorithm::Sha512 => {
            let mut mac = HmacSha512::new_from_slice(salt.as_bytes())
                .expect("HMAC can take key of any size");
            mac.update(input.as_bytes());
            hex::encode(mac.finalize().into_bytes())
        }
    }
}

fn digest_input(value: &ColumnValue) -> Cow<'_, str> {
    match value {
        ColumnValue::Null => Cow::Borrowed("<nil>"),
        ColumnValue::String(s) => Cow::Borrowed(s),
        ColumnValue::Float(f) => Cow::Owned(render_float(*f, &format!("{:e}", f))),
        ColumnValue::Float32(f) => Cow::Owned(render_float(f64::from(*f), &format!("{:e}", f))),
        ColumnValue::Json(raw) => Cow::Owned(byte_list(raw.get().as_bytes())),
        other => Cow::Owned(other.to_string()),
    }
}

/// Rewrite shortest `{:e}` output (`1.5e-7`) of `value` into the hashed
/// float form.
fn render_float(value: f64, sci: &str) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value < 0.0 { "-Inf" } else { "+Inf" }.to_string();
    }
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return sci.to_string();
    };
    let Ok(exp) = exp.parse::<i32>() else {
        return sci.to_string();
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(m) => ("-", m),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    if !(-4..6).contains(&exp) {
        let (head, tail) = digits.split_at(1);
        let dot = if tail.is_empty() { "" } else { "." };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{sign}{head}{dot}{tail}e{exp_sign}{:02}", exp.abs())
    } else if exp < 0 {
        let zeros = "0".repeat((-exp - 1) as usize);
        format!("{sign}0.{zeros}{digits}")
    } else {
        let point = exp as usize + 1;
        if digits.len() <= point {
            format!("{sign}{digits}{}", "0".repeat(point - digits.len()))
        } else {
            format!("{sign}{}.{}", &digits[..point], &digits[point..])
        }
    }
}

fn byte_list(bytes: &[u8]) -> String {
    let items: Vec<String> = bytes.iter().map(u8::to_string).collect();
    format!("[{}]", items.join(" "))
}

fn truncate_chars(s: &mut String, limit: i32) {
    if limit <= 0 {
        return;
    }
    let limit = limit as usize;
    if let Some((idx, _)) = s.char_indices().nth(limit) {
        s.truncate(idx);
    }
}
