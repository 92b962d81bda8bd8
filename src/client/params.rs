//! Client construction parameters.

use std::collections::BTreeMap;

use crate::config::CoreConfig;
use crate::error::ClientError;
use crate::storage::models::{ConnectionKind, ConnectionRecord, Endpoint, Timeouts};

/// Parameters for a self-hosted cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomParams {
    pub http: Endpoint,
    /// Omitted entirely when not configured.
    pub grpc: Option<Endpoint>,
    pub api_key: Option<String>,
    pub timeouts: Timeouts,
    pub skip_init_checks: bool,
    pub headers: BTreeMap<String, String>,
}

impl CustomParams {
    /// The HTTP-only variant used after the gRPC channel was rejected.
    ///
    /// Startup checks are skipped too: the standard probe may itself go
    /// through the channel that was just removed.
    pub fn without_grpc(&self) -> Self {
        Self {
            grpc: None,
            skip_init_checks: true,
            ..self.clone()
        }
    }
}

/// Parameters for a managed cloud cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudParams {
    pub cluster_url: String,
    pub api_key: String,
    pub timeouts: Timeouts,
    pub skip_init_checks: bool,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientParams {
    Custom(CustomParams),
    Cloud(CloudParams),
}

impl ClientParams {
    /// Resolve construction parameters from a record.
    pub fn from_record(record: &ConnectionRecord, config: &CoreConfig) -> Result<Self, ClientError> {
        let mut headers = BTreeMap::new();
        headers.insert(
            config.integration_header.name.clone(),
            config.integration_header.value.clone(),
        );

        let api_key = record
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string);

        match &record.kind {
            ConnectionKind::Custom { http, grpc } => Ok(ClientParams::Custom(CustomParams {
                http: http.clone(),
                grpc: grpc.clone(),
                api_key,
                timeouts: record.timeouts,
                skip_init_checks: record.skip_init_checks,
                headers,
            })),
            ConnectionKind::Cloud { cloud_url } => {
                let api_key = api_key.ok_or_else(|| ClientError::Configuration {
                    message: "cloud connections require an API key".to_string(),
                })?;
                Ok(ClientParams::Cloud(CloudParams {
                    cluster_url: cloud_url.clone(),
                    api_key,
                    timeouts: record.timeouts,
                    skip_init_checks: record.skip_init_checks,
                    headers,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::NewConnection;

    #[test]
    fn test_custom_params_carry_header_and_grpc() {
        let config = CoreConfig::default();
        let record = ConnectionRecord::from_new(
            NewConnection::custom(
                "Local",
                Endpoint::new("localhost", 8080, false),
                Some(Endpoint::new("localhost", 50051, false)),
            ),
            "2",
        );

        match ClientParams::from_record(&record, &config).unwrap() {
            ClientParams::Custom(params) => {
                assert_eq!(params.grpc.as_ref().map(|g| g.port), Some(50051));
                assert_eq!(
                    params.headers.get("X-Weaviate-Client-Integration"),
                    Some(&config.integration_header.value)
                );
                let fallback = params.without_grpc();
                assert_eq!(fallback.grpc, None);
                assert!(fallback.skip_init_checks);
                assert_eq!(fallback.http, params.http);
            }
            other => panic!("expected custom params, got {:?}", other),
        }
    }

    #[test]
    fn test_cloud_without_key_is_rejected() {
        let mut record = ConnectionRecord::from_new(
            NewConnection::cloud("Prod", "https://x.weaviate.cloud", "key"),
            "2",
        );
        record.api_key = Some("   ".to_string());
        assert!(matches!(
            ClientParams::from_record(&record, &CoreConfig::default()),
            Err(ClientError::Configuration { .. })
        ));
    }

    #[test]
    fn test_timeouts_forwarded_verbatim() {
        let mut record = ConnectionRecord::from_new(
            NewConnection::cloud("Prod", "https://x.weaviate.cloud", "key"),
            "2",
        );
        record.timeouts = Timeouts {
            init: Some(30),
            query: Some(60),
            insert: Some(120),
        };
        match ClientParams::from_record(&record, &CoreConfig::default()).unwrap() {
            ClientParams::Cloud(params) => assert_eq!(params.timeouts, record.timeouts),
            other => panic!("expected cloud params, got {:?}", other),
        }
    }
}
