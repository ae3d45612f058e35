//! Tuple decoder
//!
//! Turns pgoutput tuple cells into a [`Row`] plus per-column
//! [`ColumnTypeMetadata`], using the layout published in the
//! [`RelationCache`].
//!
//! A value that fails to parse under its declared type is logged and kept as
//! its raw text; it never fails the row. Structural problems (unknown
//! relation, column count drift, binary or unknown markers, an excluded
//! primary key) fail the call and no partial row is returned.

use crate::common::{
    CdcError, CdcFilter, ColumnTypeMetadata, ColumnTypes, ColumnValue, ConnectorConfig, Result,
    Row, RowImage, FORMAT_TOAST_PLACEHOLDER,
};
use super::relation::excluded_primary_key;
use crate::postgres::{
    PostgresTypeMapper, RelationCache, RelationInfo, TupleColumn, MARKER_BINARY, MARKER_NULL,
    MARKER_TEXT, MARKER_UNCHANGED_TOAST,
};
use std::sync::Arc;
use tracing::warn;

/// A decoded row image and the type identity of each of its columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedTuple {
    pub row: Row,
    pub column_types: ColumnTypes,
}

/// Decodes text-format tuples for cached relations.
///
/// Column exclusion uses the [`RelationCache`] filter, read on every call, so
/// the filter that validated a relation is the one that drops its columns.
#[derive(Debug, Clone)]
pub struct TupleDecoder {
    relations: Arc<RelationCache>,
    toast_placeholder: String,
}

impl TupleDecoder {
    /// Create a decoder with the connector's TOAST settings, installing
    /// `config.tables` as the cache's filter.
    ///
    /// Build the decoder before publishing relations so their updates are
    /// validated against this filter.
    pub fn new(relations: Arc<RelationCache>, config: &ConnectorConfig) -> Self {
        relations.set_filter(config.tables.clone());
        Self::with_toast_placeholder(relations, config.toast.placeholder_value())
    }

    /// Create a decoder that keeps whatever filter the cache already has.
    pub fn with_toast_placeholder(
        relations: Arc<RelationCache>,
        toast_placeholder: impl Into<String>,
    ) -> Self {
        Self {
            relations,
            toast_placeholder: toast_placeholder.into(),
        }
    }

    pub fn relations(&self) -> &Arc<RelationCache> {
        &self.relations
    }

    pub fn toast_placeholder(&self) -> &str {
        &self.toast_placeholder
    }

    /// Current column filter; callers use it to skip tables too.
    pub fn filter(&self) -> Arc<CdcFilter> {
        self.relations.filter()
    }

    fn relation(&self, relation_id: u32) -> Result<Arc<RelationInfo>> {
        self.relations
            .get(relation_id)
            .ok_or(CdcError::UnknownRelation(relation_id))
    }

    /// Decode one row image.
    ///
    /// Columns excluded by the filter are omitted from both the row and the
    /// type map.
    pub fn decode_tuple(&self, relation_id: u32, columns: &[TupleColumn]) -> Result<DecodedTuple> {
        let rel = self.relation(relation_id)?;

        if columns.len() != rel.columns.len() {
            return Err(CdcError::ColumnCountMismatch {
                table: rel.qualified_name(),
                got: columns.len(),
                expected: rel.columns.len(),
            });
        }

        let filter = self.relations.filter();
        // the filter may have changed after this relation was validated
        if let Some(col) = excluded_primary_key(&filter, &rel) {
            return Err(CdcError::PrimaryKeyExcluded {
                column: rel.qualified_column(&col.name),
            });
        }

        let mut decoded = DecodedTuple::default();

        for (cell, col) in columns.iter().zip(rel.columns.iter()) {
            if filter.column_excluded(&rel.schema, &rel.name, &col.name) {
                continue;
            }

            let meta = ColumnTypeMetadata::new(col.type_oid, col.effective_type_name())
                .with_unknown(!PostgresTypeMapper::is_known(col.type_oid));

            let (value, meta) = match cell.marker {
                MARKER_NULL => (ColumnValue::Null, meta),
                MARKER_UNCHANGED_TOAST => (
                    ColumnValue::String(self.toast_placeholder.clone()),
                    meta.with_format(FORMAT_TOAST_PLACEHOLDER),
                ),
                MARKER_TEXT => {
                    let value = match PostgresTypeMapper::decode_text(&cell.data, col.type_oid) {
                        Ok(v) => v,
                        Err(e) => {
                            warn!(
                                table = %rel.qualified_name(),
                                column = %col.name,
                                type_oid = col.type_oid,
                                error = %e,
                                "decode text value failed, preserving as string"
                            );
                            ColumnValue::String(String::from_utf8_lossy(&cell.data).into_owned())
                        }
                    };
                    (value, meta)
                }
                MARKER_BINARY => {
                    return Err(CdcError::BinaryTupleData {
                        column: rel.qualified_column(&col.name),
                        type_oid: col.type_oid,
                    });
                }
                other => {
                    return Err(CdcError::UnknownTupleFormat {
                        marker: other as char,
                        column: rel.qualified_column(&col.name),
                        type_oid: col.type_oid,
                    });
                }
            };

            decoded.row.insert(col.name.clone(), value);
            decoded.column_types.insert(col.name.clone(), meta);
        }

        Ok(decoded)
    }

    /// Primary-key values of `row`.
    ///
    /// Every key column must be present and non-null.
    pub fn extract_pk(&self, relation_id: u32, row: &Row) -> Result<Row> {
        let rel = self.relation(relation_id)?;

        let mut pk = Row::new();
        for col in rel.primary_key_columns() {
            let value = pk_value(&rel, &col.name, row, RowImage::Row)?;
            pk.insert(col.name.clone(), value.clone());
        }
        Ok(pk)
    }

    /// Check whether an update changed the primary key.
    ///
    /// Both images must carry every key column, non-null.
    pub fn pk_changed(&self, relation_id: u32, before: &Row, after: &Row) -> Result<bool> {
        let rel = self.relation(relation_id)?;

        for col in rel.primary_key_columns() {
            let b = pk_value(&rel, &col.name, before, RowImage::Before)?;
            let a = pk_value(&rel, &col.name, after, RowImage::After)?;
            if !pk_values_equal(b, a) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn pk_value<'a>(
    rel: &RelationInfo,
    column: &str,
    row: &'a Row,
    image: RowImage,
) -> Result<&'a ColumnValue> {
    match row.get(column) {
        None => Err(CdcError::MissingPrimaryKey {
            column: rel.qualified_column(column),
            image,
        }),
        Some(ColumnValue::Null) => Err(CdcError::NullPrimaryKey {
            column: rel.qualified_column(column),
            image,
        }),
        Some(v) => Ok(v),
    }
}

/// Same-variant values compare directly; anything else compares by string
/// rendering.
pub fn pk_values_equal(a: &ColumnValue, b: &ColumnValue) -> bool {
    use ColumnValue::*;
    match (a, b) {
        (Int(x), Int(y)) => x == y,
        (UInt(x), UInt(y)) => x == y,
        (String(x), String(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Float32(x), Float32(y)) => x == y,
        (Bool(x), Bool(y)) => x == y,
        (Null, Null) => true,
        _ => a.to_string() == b.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::FilterConfig;
    use crate::postgres::{Column, OID_INT4, OID_INT8, OID_JSONB, OID_TEXT};
    use pretty_assertions::assert_eq;

    const USERS: u32 = 16384;

    fn decoder_with(filter: FilterConfig) -> TupleDecoder {
        let relations = Arc::new(RelationCache::new());
        let config = ConnectorConfig {
            tables: filter,
            ..Default::default()
        };
        let decoder = TupleDecoder::new(relations.clone(), &config);
        relations
            .update(
                USERS,
                RelationInfo::new(
                    USERS,
                    "public",
                    "users",
                    vec![
                        Column::primary_key("id", OID_INT4),
                        Column::new("email", OID_TEXT),
                        Column::new("balance", OID_INT8),
                    ],
                ),
            )
            .unwrap();
        decoder
    }

    fn decoder() -> TupleDecoder {
        decoder_with(FilterConfig::default())
    }

    fn row(pairs: &[(&str, ColumnValue)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_decode_text_columns() {
        let decoded = decoder()
            .decode_tuple(
                USERS,
                &["42".into(), "alice@example.com".into(), "9007199254740993".into()],
            )
            .unwrap();

        assert_eq!(
            decoded.row,
            row(&[
                ("id", ColumnValue::Int(42)),
                ("email", ColumnValue::from("alice@example.com")),
                ("balance", ColumnValue::from("9007199254740993")),
            ])
        );
        assert_eq!(
            decoded.column_types["id"],
            ColumnTypeMetadata::new(OID_INT4, "int4")
        );
        assert_eq!(decoded.column_types["balance"].name, "int8");
        assert!(!decoded.column_types["email"].unknown);
    }

    #[test]
    fn test_decode_null_keeps_type_metadata() {
        let decoded = decoder()
            .decode_tuple(USERS, &["1".into(), TupleColumn::null(), "0".into()])
            .unwrap();

        assert_eq!(decoded.row["email"], ColumnValue::Null);
        assert_eq!(
            decoded.column_types["email"],
            ColumnTypeMetadata::new(OID_TEXT, "text")
        );
    }

    #[test]
    fn test_decode_unchanged_toast() {
        let decoded = decoder()
            .decode_tuple(USERS, &["1".into(), TupleColumn::unchanged_toast(), "0".into()])
            .unwrap();

        assert_eq!(
            decoded.row["email"],
            ColumnValue::from("__unijord_cdc_unavailable_value")
        );
        assert!(decoded.column_types["email"].is_toast_placeholder());
        assert_eq!(decoded.column_types["id"].format, None);
    }

    #[test]
    fn test_decode_binary_unsupported() {
        let err = decoder()
            .decode_tuple(
                USERS,
                &[TupleColumn::binary(vec![0u8, 0, 0, 42]), "x".into(), "0".into()],
            )
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("binary tuple data is not supported"), "{}", msg);
        assert!(msg.contains("public.users.id"), "{}", msg);
        assert_eq!(err.error_code(), "binary_tuple_data");
    }

    #[test]
    fn test_decode_unknown_marker() {
        let err = decoder()
            .decode_tuple(
                USERS,
                &["1".into(), TupleColumn::new(b'x', vec![1u8]), "0".into()],
            )
            .unwrap_err();
        assert!(err.to_string().contains("unknown tuple data type 'x'"));
        assert!(err.to_string().contains("public.users.email"));
    }

    #[test]
    fn test_decode_unknown_relation() {
        let err = decoder().decode_tuple(1, &["1".into()]).unwrap_err();
        assert!(matches!(err, CdcError::UnknownRelation(1)));
    }

    #[test]
    fn test_decode_column_count_mismatch() {
        let err = decoder()
            .decode_tuple(USERS, &["1".into(), "a".into()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "column count mismatch for public.users: got 2, expected 3"
        );
    }

    #[test]
    fn test_decode_parse_failure_keeps_raw_text() {
        let decoded = decoder()
            .decode_tuple(USERS, &["not-a-number".into(), "a".into(), "0".into()])
            .unwrap();
        assert_eq!(decoded.row["id"], ColumnValue::from("not-a-number"));
        assert_eq!(decoded.column_types["id"].oid, OID_INT4);
    }

    #[test]
    fn test_decode_excluded_column_omitted() {
        let decoder = decoder_with(FilterConfig {
            column_exclude: vec![r"^public\.users\.email$".into()],
            ..Default::default()
        });
        let decoded = decoder
            .decode_tuple(USERS, &["1".into(), "secret".into(), "0".into()])
            .unwrap();
        assert!(!decoded.row.contains_key("email"));
        assert!(!decoded.column_types.contains_key("email"));
        assert_eq!(decoded.row.len(), 2);
    }

    fn users() -> RelationInfo {
        RelationInfo::new(
            USERS,
            "public",
            "users",
            vec![
                Column::primary_key("id", OID_INT4),
                Column::new("email", OID_TEXT),
            ],
        )
    }

    #[test]
    fn test_config_excluding_primary_key_rejects_relation() {
        let relations = Arc::new(RelationCache::new());
        let config = ConnectorConfig {
            tables: FilterConfig {
                column_exclude: vec![r"^public\.users\.id$".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let decoder = TupleDecoder::new(relations.clone(), &config);

        let err = relations.update(USERS, users()).unwrap_err();
        assert_eq!(err.error_code(), "primary_key_excluded");
        assert!(relations.get(USERS).is_none());
        assert!(matches!(
            decoder.decode_tuple(USERS, &["1".into(), "a".into()]),
            Err(CdcError::UnknownRelation(USERS))
        ));
    }

    #[test]
    fn test_set_filter_reaches_decoder() {
        let relations = Arc::new(RelationCache::new());
        let decoder = TupleDecoder::new(relations.clone(), &ConnectorConfig::default());
        relations.update(USERS, users()).unwrap();

        let cells: [TupleColumn; 2] = ["1".into(), "a@b.c".into()];
        let keys = |d: &DecodedTuple| d.row.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys(&decoder.decode_tuple(USERS, &cells).unwrap()), vec!["email", "id"]);

        relations.set_filter(FilterConfig {
            column_exclude: vec![r"\.email$".into()],
            ..Default::default()
        });
        let decoded = decoder.decode_tuple(USERS, &cells).unwrap();
        assert_eq!(keys(&decoded), vec!["id"]);
        assert!(!decoded.column_types.contains_key("email"));
        assert!(decoder.filter().column_excluded("public", "users", "email"));
    }

    #[test]
    fn test_decode_fails_when_filter_later_excludes_primary_key() {
        let relations = Arc::new(RelationCache::new());
        let decoder = TupleDecoder::new(relations.clone(), &ConnectorConfig::default());
        relations.update(USERS, users()).unwrap();

        relations.set_filter(FilterConfig {
            column_exclude: vec![r"\.id$".into()],
            ..Default::default()
        });
        let err = decoder
            .decode_tuple(USERS, &["1".into(), "a@b.c".into()])
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("column_exclude matches primary key column public.users.id"));
    }

    #[test]
    fn test_with_toast_placeholder_keeps_cache_filter() {
        let relations = Arc::new(RelationCache::new());
        relations.set_filter(FilterConfig {
            column_exclude: vec![r"\.email$".into()],
            ..Default::default()
        });
        relations.update(USERS, users()).unwrap();

        let decoder = TupleDecoder::with_toast_placeholder(relations, "<toast>");
        let decoded = decoder
            .decode_tuple(USERS, &["1".into(), TupleColumn::unchanged_toast()])
            .unwrap();
        assert_eq!(decoded.row.len(), 1);
        assert_eq!(decoder.toast_placeholder(), "<toast>");
    }

    #[test]
    fn test_decode_unknown_oid() {
        let relations = Arc::new(RelationCache::new());
        relations
            .update(
                9,
                RelationInfo::new(
                    9,
                    "gis",
                    "places",
                    vec![
                        Column::primary_key("id", OID_INT4),
                        Column::new("geom", 90001).with_type_name("geometry"),
                        Column::new("doc", OID_JSONB),
                    ],
                ),
            )
            .unwrap();
        let decoder = TupleDecoder::new(relations, &ConnectorConfig::default());
        let decoded = decoder
            .decode_tuple(9, &["1".into(), "POINT(1 2)".into(), r#"{"k":1}"#.into()])
            .unwrap();

        assert_eq!(decoded.row["geom"], ColumnValue::from("POINT(1 2)"));
        assert!(decoded.column_types["geom"].unknown);
        assert_eq!(decoded.column_types["geom"].name, "geometry");
        assert_eq!(decoded.row["doc"], ColumnValue::json(r#"{"k":1}"#).unwrap());
    }

    #[test]
    fn test_extract_pk() {
        let d = decoder();
        let full = row(&[
            ("id", ColumnValue::Int(7)),
            ("email", ColumnValue::from("a@b.c")),
        ]);
        assert_eq!(
            d.extract_pk(USERS, &full).unwrap(),
            row(&[("id", ColumnValue::Int(7))])
        );

        let err = d
            .extract_pk(USERS, &row(&[("email", ColumnValue::from("a"))]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing primary key column public.users.id in row"
        );

        let err = d
            .extract_pk(USERS, &row(&[("id", ColumnValue::Null)]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "primary key column public.users.id is null in row"
        );
    }

    #[test]
    fn test_pk_changed() {
        let d = decoder();
        let a = row(&[("id", ColumnValue::Int(1))]);
        let b = row(&[("id", ColumnValue::Int(2))]);

        assert!(!d.pk_changed(USERS, &a, &a).unwrap());
        assert!(d.pk_changed(USERS, &a, &b).unwrap());
        assert!(d.pk_changed(USERS, &b, &a).unwrap());
    }

    #[test]
    fn test_pk_changed_errors_name_the_side() {
        let d = decoder();
        let ok = row(&[("id", ColumnValue::Int(1))]);
        let missing = Row::new();
        let null = row(&[("id", ColumnValue::Null)]);

        let err = d.pk_changed(USERS, &missing, &ok).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing primary key column public.users.id in before row"
        );
        let err = d.pk_changed(USERS, &ok, &missing).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing primary key column public.users.id in after row"
        );
        let err = d.pk_changed(USERS, &null, &ok).unwrap_err();
        assert_eq!(
            err.to_string(),
            "primary key column public.users.id is null in before row"
        );
        let err = d.pk_changed(USERS, &ok, &null).unwrap_err();
        assert_eq!(
            err.to_string(),
            "primary key column public.users.id is null in after row"
        );
    }

    #[test]
    fn test_pk_values_equal_fallback() {
        assert!(pk_values_equal(&ColumnValue::Int(5), &ColumnValue::UInt(5)));
        assert!(pk_values_equal(&ColumnValue::Int(5), &ColumnValue::from("5")));
        assert!(!pk_values_equal(&ColumnValue::Int(5), &ColumnValue::from("6")));
        assert!(pk_values_equal(
            &ColumnValue::json("[1]").unwrap(),
            &ColumnValue::json("[1]").unwrap()
        ));
        assert!(!pk_values_equal(&ColumnValue::Bool(true), &ColumnValue::Bool(false)));
    }
}
