//! Versioned migration of persisted connection records.
//!
//! Each decoded entry is classified first, then migrated in isolation:
//! - `Current` entries pass through
//! - `Structured` entries only get the current version stamp
//! - `Legacy` single-URL entries are rewritten into custom or cloud form
//! - `Unclassified` entries are retained verbatim and stay unversioned
//!
//! An entry that fails to migrate is dropped without affecting the rest.

pub mod legacy;

use serde_json::Value;
use thiserror::Error;

use crate::config::CoreConfig;
use crate::logging::structured::LogContext;
use crate::storage::models::{
    generate_connection_id, non_empty, ConnectionKind, ConnectionRecord, ConnectionStatus,
    ConnectionType, Endpoint, RecordDocument, Timeouts,
};

pub use legacy::{parse_legacy_url, upgrade_legacy, ParsedUrl};

/// Why a single entry could not be migrated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MigrationError {
    #[error("record has no name")]
    MissingName,

    #[error("{connection_type} record is missing {field}")]
    MissingField {
        connection_type: ConnectionType,
        field: &'static str,
    },

    #[error("invalid legacy URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// A decoded entry, tagged by which migration path applies to it.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistedRecord {
    Current(RecordDocument),
    Structured(RecordDocument),
    Legacy { url: String, doc: RecordDocument },
    Unclassified(RecordDocument),
}

impl PersistedRecord {
    pub fn classify(doc: RecordDocument, current_version: &str) -> Self {
        if doc.schema_version.as_deref() == Some(current_version) {
            return PersistedRecord::Current(doc);
        }
        if doc.has_structured_fields() {
            return PersistedRecord::Structured(doc);
        }
        match doc.legacy_url().map(str::to_string) {
            Some(url) => PersistedRecord::Legacy { url, doc },
            None => PersistedRecord::Unclassified(doc),
        }
    }
}

/// What migration did with one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MigrationOutcome {
    Unchanged(ConnectionRecord),
    Migrated(ConnectionRecord),
    Retained(RecordDocument),
}

/// Result of migrating a whole persisted list.
#[derive(Debug, Default)]
pub struct MigrationReport {
    pub records: Vec<ConnectionRecord>,
    /// Entries that could not be classified, kept for write-back.
    pub retained: Vec<RecordDocument>,
    pub migrated: usize,
    pub dropped: usize,
    pub malformed: usize,
}

impl MigrationReport {
    /// Whether the migrated list differs from what was persisted.
    pub fn changed(&self) -> bool {
        self.migrated > 0
    }
}

/// Migrate one classified entry.
pub fn migrate_record(
    entry: PersistedRecord,
    config: &CoreConfig,
) -> Result<MigrationOutcome, MigrationError> {
    match entry {
        PersistedRecord::Current(doc) => {
            // A generated id has to be written back or it changes every load.
            let has_id = non_empty(&doc.id).is_some();
            record_from_document(doc, config).map(|record| {
                if has_id {
                    MigrationOutcome::Unchanged(record)
                } else {
                    MigrationOutcome::Migrated(record)
                }
            })
        }
        PersistedRecord::Structured(mut doc) => {
            doc.schema_version = Some(config.schema_version.clone());
            record_from_document(doc, config).map(MigrationOutcome::Migrated)
        }
        PersistedRecord::Legacy { url, doc } => {
            let mut upgraded = upgrade_legacy(doc, &url, config)?;
            upgraded.schema_version = Some(config.schema_version.clone());
            record_from_document(upgraded, config).map(MigrationOutcome::Migrated)
        }
        PersistedRecord::Unclassified(doc) => Ok(MigrationOutcome::Retained(doc)),
    }
}

/// Migrate every entry of a persisted list.
pub fn migrate_all(entries: Vec<Value>, config: &CoreConfig, ctx: &LogContext) -> MigrationReport {
    let mut report = MigrationReport::default();

    for (index, entry) in entries.into_iter().enumerate() {
        if !entry.is_object() {
            log::warn!("{} RECORD_MALFORMED index={} reason=not_an_object", ctx, index);
            report.malformed += 1;
            continue;
        }

        let doc: RecordDocument = match serde_json::from_value(entry) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("{} RECORD_MALFORMED index={} error={}", ctx, index, e);
                report.malformed += 1;
                continue;
            }
        };

        let entry = PersistedRecord::classify(doc, &config.schema_version);
        match migrate_record(entry, config) {
            Ok(MigrationOutcome::Unchanged(record)) => report.records.push(record),
            Ok(MigrationOutcome::Migrated(record)) => {
                log::info!(
                    "{} RECORD_MIGRATED type={} version={}",
                    ctx.with_connection(&record.id),
                    record.connection_type(),
                    config.schema_version
                );
                report.migrated += 1;
                report.records.push(record);
            }
            Ok(MigrationOutcome::Retained(doc)) => {
                log::warn!(
                    "{} RECORD_UNCLASSIFIED index={} id={:?} reason=no_url",
                    ctx,
                    index,
                    doc.id
                );
                report.retained.push(doc);
            }
            Err(e) => {
                log::warn!("{} RECORD_DROPPED index={} error={}", ctx, index, e);
                report.dropped += 1;
            }
        }
    }

    log::info!(
        "{} MIGRATION_COMPLETE records={} migrated={} retained={} dropped={} malformed={}",
        ctx,
        report.records.len(),
        report.migrated,
        report.retained.len(),
        report.dropped,
        report.malformed
    );

    report
}

/// Decode a structured document into a typed record.
///
/// Status is always reset: a live handle cannot outlive the process.
pub fn record_from_document(
    doc: RecordDocument,
    config: &CoreConfig,
) -> Result<ConnectionRecord, MigrationError> {
    let name = non_empty(&doc.name)
        .map(str::to_string)
        .ok_or(MigrationError::MissingName)?;

    let connection_type = match doc.connection_type {
        Some(t) => t,
        None if non_empty(&doc.http_host).is_some() => ConnectionType::Custom,
        None if non_empty(&doc.cloud_url).is_some() => ConnectionType::Cloud,
        None => {
            return Err(MigrationError::MissingField {
                connection_type: ConnectionType::Custom,
                field: "httpHost",
            })
        }
    };

    let kind = match connection_type {
        ConnectionType::Custom => {
            let host = non_empty(&doc.http_host).ok_or(MigrationError::MissingField {
                connection_type,
                field: "httpHost",
            })?;
            let secure = doc.http_secure.unwrap_or(false);
            let port = doc.http_port.unwrap_or(if secure {
                config.default_https_port
            } else {
                config.default_http_port
            });
            let grpc = non_empty(&doc.grpc_host).map(|grpc_host| Endpoint {
                host: grpc_host.to_string(),
                port: doc.grpc_port.unwrap_or(config.default_grpc_port),
                secure: doc.grpc_secure.unwrap_or(secure),
            });
            ConnectionKind::Custom {
                http: Endpoint::new(host, port, secure),
                grpc,
            }
        }
        ConnectionType::Cloud => {
            let cloud_url = non_empty(&doc.cloud_url).ok_or(MigrationError::MissingField {
                connection_type,
                field: "cloudUrl",
            })?;
            ConnectionKind::Cloud {
                cloud_url: cloud_url.to_string(),
            }
        }
    };

    let last_used = doc.last_used_at();
    Ok(ConnectionRecord {
        id: non_empty(&doc.id)
            .map(str::to_string)
            .unwrap_or_else(generate_connection_id),
        name,
        kind,
        api_key: doc.api_key,
        timeouts: Timeouts {
            init: doc.timeout_init,
            query: doc.timeout_query,
            insert: doc.timeout_insert,
        },
        skip_init_checks: doc.skip_init_checks.unwrap_or(false),
        links: doc.links.unwrap_or_default(),
        auto_connect: doc.auto_connect.unwrap_or(false),
        last_used,
        status: ConnectionStatus::Disconnected,
        schema_version: doc.schema_version,
        extra: doc.extra,
    })
}
