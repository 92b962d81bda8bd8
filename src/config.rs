//! Configuration for the connection registry.
//!
//! Defaults match what the editor integration ships with; the environment
//! or a JSON file can override them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectionError, ConnectionResult};

/// Header sent with every client construction for traffic attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationHeader {
    pub name: String,
    pub value: String,
}

impl Default for IntegrationHeader {
    fn default() -> Self {
        Self {
            name: "X-Weaviate-Client-Integration".to_string(),
            value: format!("weaviate-studio-core/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    /// Key under which the connection list is persisted.
    pub storage_key: String,
    /// Tag stamped on records that passed the current migration.
    pub schema_version: String,
    /// Substrings identifying managed-cloud URLs in legacy records.
    pub cloud_domains: Vec<String>,
    pub default_http_port: u16,
    pub default_https_port: u16,
    pub default_grpc_port: u16,
    pub integration_header: IntegrationHeader,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage_key: "weaviate-connections".to_string(),
            schema_version: "2".to_string(),
            cloud_domains: vec![
                ".weaviate.cloud".to_string(),
                ".weaviate.network".to_string(),
                ".semi.technology".to_string(),
            ],
            default_http_port: 8080,
            default_https_port: 443,
            default_grpc_port: 50051,
            integration_header: IntegrationHeader::default(),
        }
    }
}

impl CoreConfig {
    /// Load configuration from a JSON file, or from the environment.
    pub fn load(config_path: Option<&Path>) -> ConnectionResult<Self> {
        let config = match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| ConnectionError::Config {
                    message: format!("Cannot read {}: {}", path.display(), e),
                })?;
                serde_json::from_str(&content)?
            }
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `WEAVIATE_STUDIO_*` environment variables.
    pub fn from_env() -> ConnectionResult<Self> {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("WEAVIATE_STUDIO_STORAGE_KEY") {
            config.storage_key = key;
        }

        if let Ok(port) = std::env::var("WEAVIATE_STUDIO_GRPC_PORT") {
            config.default_grpc_port = port.parse().map_err(|e| ConnectionError::Config {
                message: format!("Invalid gRPC port: {}", e),
            })?;
        }

        if let Ok(domains) = std::env::var("WEAVIATE_STUDIO_CLOUD_DOMAINS") {
            config.cloud_domains = domains
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }

        Ok(config)
    }

    pub fn validate(&self) -> ConnectionResult<()> {
        if self.storage_key.trim().is_empty() {
            return Err(ConnectionError::Config {
                message: "storage key cannot be empty".to_string(),
            });
        }
        if self.schema_version.trim().is_empty() {
            return Err(ConnectionError::Config {
                message: "schema version cannot be empty".to_string(),
            });
        }
        if self.default_http_port == 0 || self.default_https_port == 0 || self.default_grpc_port == 0 {
            return Err(ConnectionError::Config {
                message: "default ports cannot be 0".to_string(),
            });
        }
        if self.cloud_domains.is_empty() {
            return Err(ConnectionError::Config {
                message: "at least one cloud domain is required".to_string(),
            });
        }
        Ok(())
    }

    /// Whether a URL points at a managed-cloud cluster.
    pub fn is_cloud_url(&self, url: &str) -> bool {
        let lowered = url.to_lowercase();
        self.cloud_domains
            .iter()
            .any(|domain| lowered.contains(&domain.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_grpc_port, 50051);
        assert!(config.integration_header.value.starts_with("weaviate-studio-core/"));
    }

    #[test]
    fn test_cloud_url_detection() {
        let config = CoreConfig::default();
        assert!(config.is_cloud_url("https://foo.weaviate.cloud"));
        assert!(config.is_cloud_url("https://BAR.Weaviate.Network/v1"));
        assert!(!config.is_cloud_url("http://localhost:8080"));
        assert!(!config.is_cloud_url("https://weaviate.example.com"));
    }

    #[test]
    fn test_validate_rejects_empty_domains() {
        let config = CoreConfig {
            cloud_domains: Vec::new(),
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConnectionError::Config { .. })));
    }

    #[test]
    fn test_load_from_json_file_keeps_defaults_for_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.json");
        std::fs::write(&path, r#"{"storageKey": "custom-key", "defaultGrpcPort": 50052}"#).unwrap();

        let config = CoreConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage_key, "custom-key");
        assert_eq!(config.default_grpc_port, 50052);
        assert_eq!(config.schema_version, "2");
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("core.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            CoreConfig::load(Some(&path)),
            Err(ConnectionError::Serialization(_))
        ));
    }
}
