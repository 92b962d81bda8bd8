//! Client construction with gRPC negotiation.

use std::sync::Arc;

use crate::client::{ClientFactory, ClientParams, DatabaseClient};
use crate::error::ClientError;
use crate::logging::structured::LogContext;
use crate::security::redact::redact;

/// Construct a client for the given parameters.
///
/// Cloud clients are built directly. Custom clients are first built with
/// the gRPC channel; if that fails with a protocol incompatibility they
/// are rebuilt once over HTTP only. Any other failure is returned as is.
pub async fn open_client(
    factory: &dyn ClientFactory,
    params: &ClientParams,
    ctx: &LogContext,
) -> Result<Arc<dyn DatabaseClient>, ClientError> {
    match params {
        ClientParams::Cloud(cloud) => {
            log::debug!("{} CONNECT_CLOUD url={}", ctx, cloud.cluster_url);
            factory.connect_cloud(cloud).await
        }
        ClientParams::Custom(custom) => {
            log::debug!(
                "{} CONNECT_CUSTOM http={} grpc={}",
                ctx,
                custom.http,
                custom
                    .grpc
                    .as_ref()
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "none".to_string())
            );

            match factory.connect_custom(custom).await {
                Ok(client) => Ok(client),
                Err(e) if custom.grpc.is_some() && e.is_protocol_incompatibility() => {
                    log::warn!(
                        "{} CONNECT_FALLBACK_HTTP_ONLY reason={}",
                        ctx,
                        redact(&e.to_string(), custom.api_key.as_deref())
                    );
                    factory.connect_custom(&custom.without_grpc()).await
                }
                Err(e) => Err(e),
            }
        }
    }
}

/// Probe readiness; "not ready" counts as a failure.
pub async fn ensure_ready(client: &dyn DatabaseClient) -> Result<(), ClientError> {
    match client.is_ready().await {
        Ok(true) => Ok(()),
        Ok(false) => Err(ClientError::NotReady),
        Err(e) => Err(e),
    }
}
