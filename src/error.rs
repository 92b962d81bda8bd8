//! Error types for connection management.
//!
//! Three layers of errors meet here:
//! - `ConnectionError` is what the registry and lifecycle operations return
//! - `ClientError` comes back from the database client collaborator
//! - `StoreError` comes back from the persistent store collaborator

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::storage::models::ConnectionType;

/// Result type for registry and lifecycle operations.
pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Errors surfaced to callers of the connection registry.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// A required field is missing or empty.
    #[error("Invalid connection: {field} {message}")]
    Validation { field: String, message: String },

    /// Another record already uses this name (case-insensitive).
    #[error("A connection named \"{name}\" already exists ({existing_kind} connection {existing_id})")]
    NameConflict {
        name: String,
        existing_id: String,
        existing_kind: ConnectionType,
    },

    /// Operation on an unknown id.
    #[error("Connection not found: {id}")]
    NotFound { id: String },

    /// Establishing a live client failed.
    #[error("Failed to connect to \"{name}\": {source}")]
    ConnectFailure {
        name: String,
        #[source]
        source: ClientError,
    },

    /// The durable store rejected a read or write.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A configuration file or payload was not valid JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectionError {
    pub fn validation(field: &str, message: &str) -> Self {
        ConnectionError::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ConnectionError::Validation { .. } => "validation",
            ConnectionError::NameConflict { .. } => "conflict",
            ConnectionError::NotFound { .. } => "not_found",
            ConnectionError::ConnectFailure { .. } => "connect",
            ConnectionError::Persistence(..) => "persistence",
            ConnectionError::Config { .. } => "configuration",
            ConnectionError::Serialization(..) => "serialization",
        }
    }
}

/// Errors reported by the database client collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The low-latency channel speaks a protocol the server does not support.
    #[error("gRPC protocol not supported: {message}")]
    Protocol { message: String },

    /// Client startup checks failed.
    #[error("Startup check failed: {message}")]
    Startup {
        message: String,
        protocol_related: bool,
    },

    /// Network level failures
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Authentication errors
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The readiness probe answered "not ready".
    #[error("Server is not ready")]
    NotReady,

    /// Construction parameters could not be resolved.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("{message}")]
    Other { message: String },
}

lazy_static! {
    /// Markers the client library uses when the gRPC channel is unusable.
    static ref PROTOCOL_MARKERS: Vec<Regex> = vec![
        Regex::new(r"(?i)grpc.*(not supported|unsupported|unavailable|unimplemented|not enabled)").unwrap(),
        Regex::new(r"(?i)(not supported|unsupported|unavailable|unimplemented).*grpc").unwrap(),
        Regex::new(r"(?i)protocol.*(incompatib|version mismatch)").unwrap(),
        Regex::new(r"(?i)weaviategrpc").unwrap(),
    ];
}

impl ClientError {
    /// Whether this failure means "retry without the low-latency channel".
    pub fn is_protocol_incompatibility(&self) -> bool {
        match self {
            ClientError::Protocol { .. } => true,
            ClientError::Startup {
                protocol_related: true,
                ..
            } => true,
            ClientError::Startup { message, .. }
            | ClientError::Transport { message }
            | ClientError::Other { message } => {
                PROTOCOL_MARKERS.iter().any(|p| p.is_match(message))
            }
            ClientError::Authentication { .. }
            | ClientError::NotReady
            | ClientError::Configuration { .. } => false,
        }
    }
}

/// Errors reported by a `PersistentStore`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store backend error: {message}")]
    Backend { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_classification() {
        assert!(ClientError::Protocol { message: "x".to_string() }.is_protocol_incompatibility());
        assert!(ClientError::Startup {
            message: "health check".to_string(),
            protocol_related: true
        }
        .is_protocol_incompatibility());
        assert!(ClientError::Transport {
            message: "gRPC is not supported by this server version".to_string()
        }
        .is_protocol_incompatibility());
        assert!(ClientError::Other {
            message: "WeaviateGRPCUnavailableError: could not reach port 50051".to_string()
        }
        .is_protocol_incompatibility());

        assert!(!ClientError::Transport {
            message: "connection refused".to_string()
        }
        .is_protocol_incompatibility());
        assert!(!ClientError::Authentication {
            message: "grpc unavailable".to_string()
        }
        .is_protocol_incompatibility());
        assert!(!ClientError::NotReady.is_protocol_incompatibility());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(ConnectionError::validation("name", "is required").category(), "validation");
        assert_eq!(ConnectionError::NotFound { id: "x".to_string() }.category(), "not_found");
    }

    #[test]
    fn test_error_display() {
        let error = ConnectionError::NameConflict {
            name: "Local".to_string(),
            existing_id: "abc".to_string(),
            existing_kind: ConnectionType::Custom,
        };
        assert_eq!(
            format!("{}", error),
            "A connection named \"Local\" already exists (custom connection abc)"
        );

        let error = ConnectionError::validation("httpHost", "is required");
        assert_eq!(format!("{}", error), "Invalid connection: httpHost is required");
    }
}
