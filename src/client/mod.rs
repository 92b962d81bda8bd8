//! Database client seam.
//!
//! The vector database's own client library sits behind these two traits.
//! The registry only constructs clients, probes readiness and caches the
//! resulting handles; queries are issued by callers through the handle.

pub mod params;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;

pub use params::*;

/// A live session to one cluster.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Whether the server answers its readiness endpoint.
    async fn is_ready(&self) -> Result<bool, ClientError>;

    /// Release the session. Errors are not interesting at this point.
    async fn close(&self) {}
}

/// Builds live clients from resolved parameters.
#[async_trait]
pub trait ClientFactory: Send + Sync {
    /// Self-hosted cluster, HTTP plus optional gRPC channel.
    async fn connect_custom(
        &self,
        params: &CustomParams,
    ) -> Result<Arc<dyn DatabaseClient>, ClientError>;

    /// Managed cloud cluster.
    async fn connect_cloud(
        &self,
        params: &CloudParams,
    ) -> Result<Arc<dyn DatabaseClient>, ClientError>;
}
