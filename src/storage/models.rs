//! Connection record models.
//!
//! `ConnectionRecord` is the typed in-memory form. `RecordDocument` is the
//! flat shape written to the persistent store; unknown keys ride along in
//! its `extra` map so a newer client's fields survive a round trip.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Ephemeral connection state. Never trusted when read back from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Discriminant of `ConnectionKind`, as persisted in the `type` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Custom,
    Cloud,
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionType::Custom => write!(f, "custom"),
            ConnectionType::Cloud => write!(f, "cloud"),
        }
    }
}

/// Host/port/TLS triple for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl Endpoint {
    pub fn new(host: &str, port: u16, secure: bool) -> Self {
        Self {
            host: host.to_string(),
            port,
            secure,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "https" } else { "http" };
        write!(f, "{}://{}:{}", scheme, self.host, self.port)
    }
}

/// How a connection reaches its cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Self-hosted: HTTP data plane plus an optional gRPC channel.
    Custom { http: Endpoint, grpc: Option<Endpoint> },
    /// Managed cloud: one cluster URL, API key mandatory.
    Cloud { cloud_url: String },
}

impl ConnectionKind {
    pub fn connection_type(&self) -> ConnectionType {
        match self {
            ConnectionKind::Custom { .. } => ConnectionType::Custom,
            ConnectionKind::Cloud { .. } => ConnectionType::Cloud,
        }
    }
}

/// Per-operation timeout overrides, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Timeouts {
    pub init: Option<u64>,
    pub query: Option<u64>,
    pub insert: Option<u64>,
}

/// A labelled hyperlink attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLink {
    pub name: String,
    pub url: String,
}

/// One configured endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub id: String,
    pub name: String,
    pub kind: ConnectionKind,
    pub api_key: Option<String>,
    pub timeouts: Timeouts,
    pub skip_init_checks: bool,
    pub links: Vec<ConnectionLink>,
    pub auto_connect: bool,
    pub last_used: Option<DateTime<Utc>>,
    pub status: ConnectionStatus,
    pub schema_version: Option<String>,
    /// Fields this version does not know about, kept verbatim.
    pub extra: Map<String, Value>,
}

impl ConnectionRecord {
    pub fn connection_type(&self) -> ConnectionType {
        self.kind.connection_type()
    }

    /// Build a fresh record from caller input.
    pub fn from_new(new: NewConnection, schema_version: &str) -> Self {
        Self {
            id: generate_connection_id(),
            name: new.name,
            kind: new.kind,
            api_key: new.api_key,
            timeouts: new.timeouts,
            skip_init_checks: new.skip_init_checks,
            links: new.links,
            auto_connect: new.auto_connect,
            last_used: Some(Utc::now()),
            status: ConnectionStatus::Disconnected,
            schema_version: Some(schema_version.to_string()),
            extra: Map::new(),
        }
    }

    /// Apply a partial update. `last_used` is handled by the caller.
    pub fn apply(&mut self, patch: ConnectionPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(api_key) = patch.api_key {
            self.api_key = api_key;
        }
        if let Some(timeouts) = patch.timeouts {
            self.timeouts = timeouts;
        }
        if let Some(skip) = patch.skip_init_checks {
            self.skip_init_checks = skip;
        }
        if let Some(links) = patch.links {
            self.links = links;
        }
        if let Some(auto_connect) = patch.auto_connect {
            self.auto_connect = auto_connect;
        }
    }
}

/// Caller input for `add`: a record without id or bookkeeping fields.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConnection {
    pub name: String,
    pub kind: ConnectionKind,
    pub api_key: Option<String>,
    pub timeouts: Timeouts,
    pub skip_init_checks: bool,
    pub links: Vec<ConnectionLink>,
    pub auto_connect: bool,
}

impl NewConnection {
    pub fn custom(name: &str, http: Endpoint, grpc: Option<Endpoint>) -> Self {
        Self::with_kind(name, ConnectionKind::Custom { http, grpc }, None)
    }

    pub fn cloud(name: &str, cloud_url: &str, api_key: &str) -> Self {
        Self::with_kind(
            name,
            ConnectionKind::Cloud {
                cloud_url: cloud_url.to_string(),
            },
            Some(api_key.to_string()),
        )
    }

    fn with_kind(name: &str, kind: ConnectionKind, api_key: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            kind,
            api_key,
            timeouts: Timeouts::default(),
            skip_init_checks: false,
            links: Vec::new(),
            auto_connect: false,
        }
    }
}

/// Partial update for `update`. `None` leaves a field untouched;
/// `api_key: Some(None)` clears the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionPatch {
    pub name: Option<String>,
    pub kind: Option<ConnectionKind>,
    pub api_key: Option<Option<String>>,
    pub timeouts: Option<Timeouts>,
    pub skip_init_checks: Option<bool>,
    pub links: Option<Vec<ConnectionLink>>,
    pub auto_connect: Option<bool>,
}

impl ConnectionPatch {
    pub fn rename(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Whether applying this patch can invalidate the per-kind requirements.
    pub fn touches_required_fields(&self) -> bool {
        self.name.is_some() || self.kind.is_some() || self.api_key.is_some()
    }
}

/// Time-based prefix plus a random suffix.
pub fn generate_connection_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{:x}-{}", Utc::now().timestamp_millis(), &random[..12])
}

/// Flat persisted shape of a connection record.
///
/// Every known key is optional so that legacy, current and partially
/// corrupted entries all decode; classification happens in `migration`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub connection_type: Option<ConnectionType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grpc_secure: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_url: Option<String>,
    /// Legacy single combined URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_init: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_query: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_insert: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_init_checks: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ConnectionLink>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_connect: Option<bool>,
    /// Milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<i64>,
    /// Written for the benefit of older readers; never trusted on load.
    #[serde(
        default,
        deserialize_with = "lenient_status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<ConnectionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordDocument {
    /// Has the fields of a structured (post-migration) record.
    pub fn has_structured_fields(&self) -> bool {
        non_empty(&self.http_host).is_some() || non_empty(&self.cloud_url).is_some()
    }

    pub fn legacy_url(&self) -> Option<&str> {
        non_empty(&self.url)
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

impl From<&ConnectionRecord> for RecordDocument {
    fn from(record: &ConnectionRecord) -> Self {
        let mut doc = RecordDocument {
            id: Some(record.id.clone()),
            name: Some(record.name.clone()),
            connection_type: Some(record.connection_type()),
            api_key: record.api_key.clone(),
            timeout_init: record.timeouts.init,
            timeout_query: record.timeouts.query,
            timeout_insert: record.timeouts.insert,
            skip_init_checks: Some(record.skip_init_checks),
            links: if record.links.is_empty() {
                None
            } else {
                Some(record.links.clone())
            },
            auto_connect: Some(record.auto_connect),
            last_used: record.last_used.map(|t| t.timestamp_millis()),
            status: Some(record.status),
            schema_version: record.schema_version.clone(),
            extra: record.extra.clone(),
            ..RecordDocument::default()
        };

        match &record.kind {
            ConnectionKind::Custom { http, grpc } => {
                doc.http_host = Some(http.host.clone());
                doc.http_port = Some(http.port);
                doc.http_secure = Some(http.secure);
                if let Some(grpc) = grpc {
                    doc.grpc_host = Some(grpc.host.clone());
                    doc.grpc_port = Some(grpc.port);
                    doc.grpc_secure = Some(grpc.secure);
                }
            }
            ConnectionKind::Cloud { cloud_url } => {
                doc.cloud_url = Some(cloud_url.clone());
            }
        }

        doc
    }
}

/// Any casing of a known status, anything else as `None`.
fn lenient_status<'de, D>(deserializer: D) -> Result<Option<ConnectionStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    let status = raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| match s.trim().to_lowercase().as_str() {
            "disconnected" => Some(ConnectionStatus::Disconnected),
            "connecting" => Some(ConnectionStatus::Connecting),
            "connected" => Some(ConnectionStatus::Connected),
            _ => None,
        });
    Ok(status)
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn custom_record() -> ConnectionRecord {
        ConnectionRecord::from_new(
            NewConnection::custom(
                "Local",
                Endpoint::new("localhost", 8080, false),
                Some(Endpoint::new("localhost", 50051, false)),
            ),
            "2",
        )
    }

    #[test]
    fn test_document_keeps_unknown_fields() {
        let raw = json!({
            "id": "abc",
            "name": "Local",
            "type": "custom",
            "httpHost": "localhost",
            "httpPort": 8080,
            "futureFlag": {"nested": true}
        });
        let doc: RecordDocument = serde_json::from_value(raw).unwrap();
        assert_eq!(doc.extra.get("futureFlag"), Some(&json!({"nested": true})));

        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back["futureFlag"], json!({"nested": true}));
        assert_eq!(back["httpHost"], json!("localhost"));
    }

    #[test]
    fn test_document_status_is_lenient() {
        let decode = |status: Value| {
            let doc: RecordDocument =
                serde_json::from_value(json!({"name": "Local", "status": status})).unwrap();
            doc.status
        };

        assert_eq!(decode(json!("Connected")), Some(ConnectionStatus::Connected));
        assert_eq!(decode(json!("CONNECTING")), Some(ConnectionStatus::Connecting));
        assert_eq!(decode(json!("error")), None);
        assert_eq!(decode(json!(3)), None);
        assert_eq!(decode(Value::Null), None);
    }

    #[test]
    fn test_document_from_custom_record() {
        let record = custom_record();
        let doc = RecordDocument::from(&record);
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["type"], json!("custom"));
        assert_eq!(value["grpcPort"], json!(50051));
        assert_eq!(value["schemaVersion"], json!("2"));
        assert!(value.get("cloudUrl").is_none());
        assert!(value.get("url").is_none());
    }

    #[test]
    fn test_custom_without_grpc_omits_grpc_keys() {
        let mut record = custom_record();
        record.kind = ConnectionKind::Custom {
            http: Endpoint::new("localhost", 8080, false),
            grpc: None,
        };
        let value = serde_json::to_value(RecordDocument::from(&record)).unwrap();
        assert!(value.get("grpcHost").is_none());
        assert!(value.get("grpcPort").is_none());
    }

    #[test]
    fn test_generated_ids_are_distinct() {
        let ids: std::collections::HashSet<String> =
            (0..500).map(|_| generate_connection_id()).collect();
        assert_eq!(ids.len(), 500);
    }

    #[test]
    fn test_patch_clears_api_key() {
        let mut record = custom_record();
        record.api_key = Some("secret".to_string());
        record.apply(ConnectionPatch {
            api_key: Some(None),
            ..ConnectionPatch::default()
        });
        assert_eq!(record.api_key, None);
    }

    #[test]
    fn test_structured_field_probe() {
        let legacy = RecordDocument {
            url: Some("http://localhost:8080".to_string()),
            ..RecordDocument::default()
        };
        assert!(!legacy.has_structured_fields());
        assert_eq!(legacy.legacy_url(), Some("http://localhost:8080"));

        let cloud = RecordDocument {
            cloud_url: Some("https://x.weaviate.cloud".to_string()),
            ..RecordDocument::default()
        };
        assert!(cloud.has_structured_fields());
    }
}
