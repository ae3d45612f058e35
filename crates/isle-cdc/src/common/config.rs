//! Connector configuration surface.
//!
//! Loading (files, CLI, environment) belongs to the host process; this module
//! only defines the serde shapes and their validation.

use crate::common::{CdcError, ColumnTransform, FilterConfig, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default PostgreSQL port.
pub const DEFAULT_PORT: u16 = 5432;

/// Default `sslmode`.
pub const DEFAULT_SSL_MODE: &str = "prefer";

/// Default `connect_timeout` (seconds).
pub const DEFAULT_CONNECT_TIMEOUT: &str = "10";

/// Default value emitted for unchanged-TOAST columns.
pub const DEFAULT_TOAST_PLACEHOLDER: &str = "__unijord_cdc_unavailable_value";

/// Everything one connector instance needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique connector name, stamped into every envelope
    pub name: String,

    /// Database connection parameters
    pub connection: ConnectionConfig,

    /// Column redaction rules, applied in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<ColumnTransform>,

    /// Schema/table/column filtering
    #[serde(default, skip_serializing_if = "FilterConfig::is_empty")]
    pub tables: FilterConfig,

    /// Unchanged-TOAST handling
    #[serde(default, skip_serializing_if = "ToastConfig::is_default")]
    pub toast: ToastConfig,
}

impl ConnectorConfig {
    /// Create a config for a connector name and connection.
    pub fn new(name: impl Into<String>, connection: ConnectionConfig) -> Self {
        Self {
            name: name.into(),
            connection,
            ..Default::default()
        }
    }

    /// Append a transform.
    pub fn with_transform(mut self, transform: ColumnTransform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Replace the table filter.
    pub fn with_tables(mut self, tables: FilterConfig) -> Self {
        self.tables = tables;
        self
    }

    /// Check every transform before any event is processed.
    ///
    /// The first failing transform is reported with its position.
    pub fn validate(&self) -> Result<()> {
        for (idx, transform) in self.transforms.iter().enumerate() {
            if let Err(e) = transform.validate() {
                let detail = match e {
                    CdcError::Config(msg) => msg,
                    other => other.to_string(),
                };
                return Err(CdcError::config(format!("transforms[{}]: {}", idx, detail)));
            }
        }
        Ok(())
    }
}

/// Unchanged-TOAST settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToastConfig {
    /// Value used for unchanged-TOAST columns (empty = default)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub placeholder: String,
}

impl ToastConfig {
    /// Effective placeholder value.
    pub fn placeholder_value(&self) -> &str {
        if self.placeholder.is_empty() {
            DEFAULT_TOAST_PLACEHOLDER
        } else {
            &self.placeholder
        }
    }

    fn is_default(&self) -> bool {
        self.placeholder.is_empty()
    }
}

/// PostgreSQL connection parameters.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,

    /// 0 means [`DEFAULT_PORT`]
    #[serde(default)]
    pub port: u16,

    pub user: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// `env:NAME` reads the password from the environment; used only when
    /// `password` is empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password_ref: String,

    pub database: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub ssl_mode: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub connect_timeout: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("password_ref", &self.password_ref)
            .field("database", &self.database)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl ConnectionConfig {
    /// Create connection parameters with defaults for everything optional.
    pub fn new(host: impl Into<String>, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// libpq keyword/value connection string.
    pub fn dsn(&self) -> String {
        self.build_dsn(false)
    }

    /// Connection string for a logical replication session.
    pub fn replication_dsn(&self) -> String {
        self.build_dsn(true)
    }

    /// Effective port.
    pub fn effective_port(&self) -> u16 {
        if self.port == 0 {
            DEFAULT_PORT
        } else {
            self.port
        }
    }

    /// Effective password: inline value first, then `password_ref`.
    pub fn resolved_password(&self) -> String {
        if !self.password.is_empty() || self.password_ref.is_empty() {
            return self.password.clone();
        }
        match self.password_ref.strip_prefix("env:") {
            Some(var) if !var.is_empty() => std::env::var(var).unwrap_or_default(),
            _ => self.password_ref.clone(),
        }
    }

    fn build_dsn(&self, replication: bool) -> String {
        let ssl_mode = if self.ssl_mode.is_empty() {
            DEFAULT_SSL_MODE
        } else {
            &self.ssl_mode
        };
        let connect_timeout = if self.connect_timeout.is_empty() {
            DEFAULT_CONNECT_TIMEOUT
        } else {
            &self.connect_timeout
        };

        let mut dsn = format!(
            "host={} port={} dbname={} user={} password={} sslmode={}",
            self.host,
            self.effective_port(),
            self.database,
            self.user,
            self.resolved_password(),
            ssl_mode,
        );
        if replication {
            dsn.push_str(" replication=database");
        }
        dsn.push_str(" connect_timeout=");
        dsn.push_str(connect_timeout);
        dsn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TransformKind;
    use pretty_assertions::assert_eq;

    fn connection() -> ConnectionConfig {
        ConnectionConfig::new("db.internal", "cdc", "shop")
    }

    #[test]
    fn test_dsn_defaults() {
        let mut conn = connection();
        conn.password = "pw".into();
        assert_eq!(
            conn.dsn(),
            "host=db.internal port=5432 dbname=shop user=cdc password=pw sslmode=prefer connect_timeout=10"
        );
        assert_eq!(
            conn.replication_dsn(),
            "host=db.internal port=5432 dbname=shop user=cdc password=pw sslmode=prefer replication=database connect_timeout=10"
        );
    }

    #[test]
    fn test_dsn_explicit_values() {
        let conn = ConnectionConfig {
            port: 6543,
            password: "pw".into(),
            ssl_mode: "require".into(),
            connect_timeout: "3".into(),
            ..connection()
        };
        assert_eq!(
            conn.dsn(),
            "host=db.internal port=6543 dbname=shop user=cdc password=pw sslmode=require connect_timeout=3"
        );
    }

    #[test]
    fn test_password_ref_env() {
        std::env::set_var("ISLE_CDC_TEST_PASSWORD_REF", "from-env");
        let conn = ConnectionConfig {
            password_ref: "env:ISLE_CDC_TEST_PASSWORD_REF".into(),
            ..connection()
        };
        assert_eq!(conn.resolved_password(), "from-env");

        // inline password wins
        let conn = ConnectionConfig {
            password: "inline".into(),
            ..conn
        };
        assert_eq!(conn.resolved_password(), "inline");
    }

    #[test]
    fn test_password_ref_literal() {
        let conn = ConnectionConfig {
            password_ref: "literal-secret".into(),
            ..connection()
        };
        assert_eq!(conn.resolved_password(), "literal-secret");
    }

    #[test]
    fn test_debug_redacts_password() {
        let conn = ConnectionConfig {
            password: "hunter2".into(),
            ..connection()
        };
        let debug = format!("{:?}", conn);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_toast_placeholder() {
        assert_eq!(
            ToastConfig::default().placeholder_value(),
            "__unijord_cdc_unavailable_value"
        );
        let toast = ToastConfig {
            placeholder: "<unchanged>".into(),
        };
        assert_eq!(toast.placeholder_value(), "<unchanged>");
    }

    #[test]
    fn test_validate_ok() {
        let config = ConnectorConfig::new("orders", connection())
            .with_transform(ColumnTransform::mask(r"public\.users\.email"))
            .with_transform(ColumnTransform::hash(r"public\.users\.ssn").with_hash_salt("s"))
            .with_transform(ColumnTransform::truncate(r"public\.users\.bio", 10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_identifies_transform() {
        let config = ConnectorConfig::new("orders", connection())
            .with_transform(ColumnTransform::mask(r"public\.users\.email"))
            .with_transform(ColumnTransform::mask("("));
        let err = config.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("transforms[1]"), "{}", msg);
        assert!(msg.contains("columns is invalid for transform"), "{}", msg);

        let config = ConnectorConfig::new("orders", connection()).with_transform(ColumnTransform {
            kind: TransformKind::from("rot13".to_string()),
            ..ColumnTransform::mask("x")
        });
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("transforms[0]: invalid transform type: rot13"), "{}", msg);

        let config = ConnectorConfig::new("orders", connection())
            .with_transform(ColumnTransform::mask(""));
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("columns is empty for transform"), "{}", msg);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
name: orders-cdc
connection:
  host: localhost
  user: cdc
  password_ref: env:PG_PASSWORD
  database: shop
transforms:
  - columns: 'public\.users\.email'
    type: mask
    maskLength: 8
  - columns: 'public\.users\.ssn'
    type: hash
    hashAlgorithm: SHA512
    hashSalt: pepper
  - columns: 'public\.users\.bio'
    type: truncate
    truncateChar: 16
tables:
  schema_include: ['^public$']
  column_exclude: ['\.password_hash$']
toast:
  placeholder: '<toast>'
"#;
        let config: ConnectorConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.name, "orders-cdc");
        assert_eq!(config.connection.effective_port(), 5432);
        assert_eq!(config.transforms.len(), 3);
        assert_eq!(config.transforms[0].kind, TransformKind::Mask);
        assert_eq!(config.transforms[0].mask_length, 8);
        assert_eq!(config.transforms[1].hash_algorithm, "SHA512");
        assert_eq!(config.transforms[2].truncate_char, 16);
        assert_eq!(config.tables.schema_include, vec!["^public$".to_string()]);
        assert_eq!(config.toast.placeholder_value(), "<toast>");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_type_survives_deserialization() {
        let json = r#"{
            "name": "n",
            "connection": {"host": "h", "user": "u", "database": "d"},
            "transforms": [{"columns": "x", "type": "encrypt"}]
        }"#;
        let config: ConnectorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.transforms[0].kind,
            TransformKind::Unknown("encrypt".into())
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serialize_omits_empty_sections() {
        let config = ConnectorConfig::new("n", ConnectionConfig::new("h", "u", "d"));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "n",
                "connection": {"host": "h", "port": 0, "user": "u", "database": "d"}
            })
        );
    }
}
