//! Legacy single-URL records.
//!
//! Before the custom/cloud split a record carried one combined `url`.
//! Upgrading rewrites such a document into the structured shape.

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::CoreConfig;
use crate::storage::models::{ConnectionType, RecordDocument};

use super::MigrationError;

lazy_static! {
    /// `scheme://host:port/path`, scheme and port optional.
    static ref URL_PATTERN: Regex = Regex::new(
        r"^(?:(?P<scheme>[A-Za-z][A-Za-z0-9+.-]*)://)?(?P<host>\[[^\]]+\]|[^:/?#\s]+)(?::(?P<port>\d+))?(?:[/?#]\S*)?$"
    ).unwrap();
}

/// Host/port/TLS parsed from a legacy URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

/// Parse a legacy URL. A missing port defaults by scheme; a missing
/// scheme means plain HTTP.
pub fn parse_legacy_url(url: &str, config: &CoreConfig) -> Result<ParsedUrl, MigrationError> {
    let trimmed = url.trim();
    let invalid = |reason: &str| MigrationError::InvalidUrl {
        url: trimmed.to_string(),
        reason: reason.to_string(),
    };

    let caps = URL_PATTERN
        .captures(trimmed)
        .ok_or_else(|| invalid("not a URL"))?;

    let secure = match caps.name("scheme").map(|m| m.as_str().to_lowercase()) {
        None => false,
        Some(scheme) if scheme == "http" => false,
        Some(scheme) if scheme == "https" => true,
        Some(_) => return Err(invalid("unsupported scheme")),
    };

    let host = caps
        .name("host")
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| invalid("missing host"))?;

    let port = match caps.name("port") {
        Some(m) => m
            .as_str()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| invalid("port out of range"))?,
        None if secure => config.default_https_port,
        None => config.default_http_port,
    };

    Ok(ParsedUrl { host, port, secure })
}

/// Rewrite a legacy document into the structured shape.
///
/// Cloud URLs become the cluster endpoint. Anything else becomes a custom
/// record with a gRPC channel on the same host at the default port, since
/// legacy records never configured one.
pub fn upgrade_legacy(
    mut doc: RecordDocument,
    url: &str,
    config: &CoreConfig,
) -> Result<RecordDocument, MigrationError> {
    let url = url.trim().to_string();

    if config.is_cloud_url(&url) {
        doc.connection_type = Some(ConnectionType::Cloud);
        doc.cloud_url = Some(url.clone());
    } else {
        let parsed = parse_legacy_url(&url, config)?;
        doc.connection_type = Some(ConnectionType::Custom);
        doc.http_host = Some(parsed.host.clone());
        doc.http_port = Some(parsed.port);
        doc.http_secure = Some(parsed.secure);
        doc.grpc_host = Some(parsed.host);
        doc.grpc_port = Some(config.default_grpc_port);
        doc.grpc_secure = Some(parsed.secure);
    }

    if doc.name.as_deref().map(str::trim).unwrap_or("").is_empty() {
        doc.name = Some(url);
    }
    doc.url = None;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_with_port() {
        let parsed = parse_legacy_url("http://localhost:8080", &CoreConfig::default()).unwrap();
        assert_eq!(
            parsed,
            ParsedUrl {
                host: "localhost".to_string(),
                port: 8080,
                secure: false
            }
        );
    }

    #[test]
    fn test_parse_default_ports() {
        let config = CoreConfig::default();
        let secure = parse_legacy_url("https://host.example.com", &config).unwrap();
        assert_eq!(secure.port, 443);
        assert!(secure.secure);

        let plain = parse_legacy_url("http://host.example.com/v1/", &config).unwrap();
        assert_eq!(plain.port, 8080);
        assert!(!plain.secure);
    }

    #[test]
    fn test_parse_without_scheme() {
        let parsed = parse_legacy_url("weaviate.internal:9090", &CoreConfig::default()).unwrap();
        assert_eq!(parsed.host, "weaviate.internal");
        assert_eq!(parsed.port, 9090);
        assert!(!parsed.secure);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        let config = CoreConfig::default();
        assert!(parse_legacy_url("ftp://host", &config).is_err());
        assert!(parse_legacy_url("http://host:99999", &config).is_err());
        assert!(parse_legacy_url("http://", &config).is_err());
        assert!(parse_legacy_url("not a url", &config).is_err());
    }

    #[test]
    fn test_upgrade_cloud() {
        let doc = RecordDocument {
            url: Some("https://foo.weaviate.cloud".to_string()),
            api_key: Some("key".to_string()),
            ..RecordDocument::default()
        };
        let upgraded = upgrade_legacy(doc, "https://foo.weaviate.cloud", &CoreConfig::default()).unwrap();
        assert_eq!(upgraded.connection_type, Some(ConnectionType::Cloud));
        assert_eq!(upgraded.cloud_url.as_deref(), Some("https://foo.weaviate.cloud"));
        assert_eq!(upgraded.url, None);
        assert_eq!(upgraded.name.as_deref(), Some("https://foo.weaviate.cloud"));
    }

    #[test]
    fn test_upgrade_custom_synthesizes_grpc() {
        let doc = RecordDocument {
            name: Some("Local".to_string()),
            url: Some("http://localhost:8080".to_string()),
            ..RecordDocument::default()
        };
        let upgraded = upgrade_legacy(doc, "http://localhost:8080", &CoreConfig::default()).unwrap();
        assert_eq!(upgraded.connection_type, Some(ConnectionType::Custom));
        assert_eq!(upgraded.http_host.as_deref(), Some("localhost"));
        assert_eq!(upgraded.http_port, Some(8080));
        assert_eq!(upgraded.http_secure, Some(false));
        assert_eq!(upgraded.grpc_host.as_deref(), Some("localhost"));
        assert_eq!(upgraded.grpc_port, Some(50051));
        assert_eq!(upgraded.name.as_deref(), Some("Local"));
    }
}
