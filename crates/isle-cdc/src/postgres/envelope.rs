//! Envelope builder
//!
//! Stamps decoded rows with source provenance, runs the column transforms and
//! produces one [`Envelope`] per change.
//!
//! Two clocks are recorded: `commit_time_us` is when PostgreSQL committed the
//! change, `ts_u_sec` is when the envelope was built.

use crate::common::{
    CdcOp, ColumnTypes, ConnectorConfig, Envelope, EnvelopePayload, PatternCache, Row,
    SourceMetadata, TransformEngine, CONNECTOR_VERSION,
};
use crate::postgres::RelationInfo;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Replication coordinates of one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePosition {
    /// WAL position
    pub lsn: u64,
    /// Transaction id
    pub tx_id: u64,
    /// Commit timestamp
    pub commit_time: DateTime<Utc>,
}

impl SourcePosition {
    pub fn new(lsn: u64, tx_id: u64, commit_time: DateTime<Utc>) -> Self {
        Self {
            lsn,
            tx_id,
            commit_time,
        }
    }
}

/// Builds insert/update/delete/truncate envelopes for one connector.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    connector_name: String,
    database: String,
    transforms: TransformEngine,
}

impl EnvelopeBuilder {
    pub fn new(
        connector_name: impl Into<String>,
        database: impl Into<String>,
        transforms: TransformEngine,
    ) -> Self {
        Self {
            connector_name: connector_name.into(),
            database: database.into(),
            transforms,
        }
    }

    /// Create a builder from connector config, matching transform columns
    /// through `patterns`.
    pub fn from_config(config: &ConnectorConfig, patterns: Arc<PatternCache>) -> Self {
        Self::new(
            config.name.clone(),
            config.connection.database.clone(),
            TransformEngine::new(config.transforms.clone(), patterns),
        )
    }

    pub fn connector_name(&self) -> &str {
        &self.connector_name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Envelope for an INSERT, or a snapshot read when `is_snapshot` is set.
    pub fn build_insert(
        &self,
        rel: &RelationInfo,
        after: &Row,
        column_types: ColumnTypes,
        position: SourcePosition,
        is_snapshot: bool,
    ) -> Envelope {
        let op = if is_snapshot {
            CdcOp::Snapshot
        } else {
            CdcOp::Insert
        };
        let after = self.transforms.apply(&rel.schema, &rel.name, after);
        self.envelope(
            rel,
            op,
            None,
            Some(after),
            Some(column_types),
            position,
            is_snapshot,
        )
    }

    /// Envelope for an UPDATE. `before` is absent when the table's replica
    /// identity did not send an old image.
    pub fn build_update(
        &self,
        rel: &RelationInfo,
        before: Option<&Row>,
        after: &Row,
        column_types: ColumnTypes,
        position: SourcePosition,
    ) -> Envelope {
        let before = self.transforms.apply_opt(&rel.schema, &rel.name, before);
        let after = self.transforms.apply(&rel.schema, &rel.name, after);
        self.envelope(
            rel,
            CdcOp::Update,
            before,
            Some(after),
            Some(column_types),
            position,
            false,
        )
    }

    /// Envelope for a DELETE.
    pub fn build_delete(
        &self,
        rel: &RelationInfo,
        before: &Row,
        column_types: ColumnTypes,
        position: SourcePosition,
    ) -> Envelope {
        let before = self.transforms.apply(&rel.schema, &rel.name, before);
        self.envelope(
            rel,
            CdcOp::Delete,
            Some(before),
            None,
            Some(column_types),
            position,
            false,
        )
    }

    /// Envelope for a TRUNCATE: no row images, no column types.
    pub fn build_truncate(&self, rel: &RelationInfo, position: SourcePosition) -> Envelope {
        self.envelope(rel, CdcOp::Truncate, None, None, None, position, false)
    }

    #[allow(clippy::too_many_arguments)]
    fn envelope(
        &self,
        rel: &RelationInfo,
        op: CdcOp,
        before: Option<Row>,
        after: Option<Row>,
        column_types: Option<ColumnTypes>,
        position: SourcePosition,
        is_snapshot: bool,
    ) -> Envelope {
        Envelope {
            payload: EnvelopePayload {
                before,
                after,
                source: SourceMetadata {
                    version: CONNECTOR_VERSION.to_string(),
                    connector_name: self.connector_name.clone(),
                    table: rel.name.clone(),
                    schema: rel.schema.clone(),
                    db_name: self.database.clone(),
                    lsn: position.lsn,
                    tx_id: position.tx_id,
                    commit_time_us: position.commit_time.timestamp_micros(),
                    is_snapshot: is_snapshot.to_string(),
                },
                op,
                ts_u_sec: Utc::now().timestamp_micros(),
                column_types,
                transaction: None,
            },
        }
    }
}
