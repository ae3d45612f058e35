//! pgoutput tuple cells
//!
//! One [`TupleColumn`] per column of a row image, tagged with the one-byte
//! format marker pgoutput writes before each value.

use bytes::Bytes;

/// SQL NULL
pub const MARKER_NULL: u8 = b'n';
/// Unchanged TOAST value (not re-sent)
pub const MARKER_UNCHANGED_TOAST: u8 = b'u';
/// Text (`typoutput`) representation
pub const MARKER_TEXT: u8 = b't';
/// Binary (`typsend`) representation
pub const MARKER_BINARY: u8 = b'b';

/// Column data within a tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleColumn {
    pub marker: u8,
    pub data: Bytes,
}

impl TupleColumn {
    pub fn new(marker: u8, data: impl Into<Bytes>) -> Self {
        Self {
            marker,
            data: data.into(),
        }
    }

    pub fn null() -> Self {
        Self::new(MARKER_NULL, Bytes::new())
    }

    pub fn unchanged_toast() -> Self {
        Self::new(MARKER_UNCHANGED_TOAST, Bytes::new())
    }

    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(MARKER_TEXT, data)
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(MARKER_BINARY, data)
    }

    pub fn is_null(&self) -> bool {
        self.marker == MARKER_NULL
    }
}

impl From<&str> for TupleColumn {
    fn from(text: &str) -> Self {
        Self::text(Bytes::copy_from_slice(text.as_bytes()))
    }
}

impl From<Option<&str>> for TupleColumn {
    fn from(text: Option<&str>) -> Self {
        match text {
            Some(t) => t.into(),
            None => Self::null(),
        }
    }
}
