//! Record-level validation.

use std::collections::HashMap;

use crate::error::{ConnectionError, ConnectionResult};
use crate::storage::models::{ConnectionKind, ConnectionLink, ConnectionRecord};

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Check the fields every record needs plus the ones its kind requires.
pub fn validate_fields(
    name: &str,
    kind: &ConnectionKind,
    api_key: Option<&str>,
) -> ConnectionResult<()> {
    if is_blank(name) {
        return Err(ConnectionError::validation("name", "is required"));
    }

    match kind {
        ConnectionKind::Custom { http, grpc } => {
            if is_blank(&http.host) {
                return Err(ConnectionError::validation("httpHost", "is required"));
            }
            if http.port == 0 {
                return Err(ConnectionError::validation("httpPort", "must be between 1 and 65535"));
            }
            if let Some(grpc) = grpc {
                if is_blank(&grpc.host) {
                    return Err(ConnectionError::validation("grpcHost", "is required when gRPC is configured"));
                }
                if grpc.port == 0 {
                    return Err(ConnectionError::validation("grpcPort", "must be between 1 and 65535"));
                }
            }
        }
        ConnectionKind::Cloud { cloud_url } => {
            if is_blank(cloud_url) {
                return Err(ConnectionError::validation("cloudUrl", "is required"));
            }
            if api_key.map(is_blank).unwrap_or(true) {
                return Err(ConnectionError::validation("apiKey", "is required for cloud connections"));
            }
        }
    }

    Ok(())
}

pub fn validate_record(record: &ConnectionRecord) -> ConnectionResult<()> {
    validate_fields(&record.name, &record.kind, record.api_key.as_deref())
}

/// Find a record, other than `exclude_id`, whose name matches case-insensitively.
pub fn find_name_conflict<'a>(
    records: &'a [ConnectionRecord],
    name: &str,
    exclude_id: Option<&str>,
) -> Option<&'a ConnectionRecord> {
    let wanted = name.trim().to_lowercase();
    records
        .iter()
        .filter(|r| Some(r.id.as_str()) != exclude_id)
        .find(|r| r.name.trim().to_lowercase() == wanted)
}

/// Fail with `NameConflict` if the name is taken.
pub fn ensure_unique_name(
    records: &[ConnectionRecord],
    name: &str,
    exclude_id: Option<&str>,
) -> ConnectionResult<()> {
    match find_name_conflict(records, name, exclude_id) {
        Some(existing) => Err(ConnectionError::NameConflict {
            name: name.to_string(),
            existing_id: existing.id.clone(),
            existing_kind: existing.connection_type(),
        }),
        None => Ok(()),
    }
}

/// Records whose names collide case-insensitively with an earlier record,
/// as `(earlier_id, colliding_id)` pairs in list order.
pub fn name_collisions(records: &[ConnectionRecord]) -> Vec<(String, String)> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    let mut collisions = Vec::new();
    for record in records {
        let key = record.name.trim().to_lowercase();
        match seen.get(&key) {
            Some(first) => collisions.push((first.to_string(), record.id.clone())),
            None => {
                seen.insert(key, &record.id);
            }
        }
    }
    collisions
}

pub fn validate_link(link: &ConnectionLink) -> ConnectionResult<()> {
    if is_blank(&link.name) {
        return Err(ConnectionError::validation("link.name", "is required"));
    }
    let url = link.url.trim().to_lowercase();
    if !(url.starts_with("http://") || url.starts_with("https://")) || url.len() <= "https://".len() {
        return Err(ConnectionError::validation("link.url", "must be an http(s) URL"));
    }
    Ok(())
}
