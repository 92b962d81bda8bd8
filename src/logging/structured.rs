//! Structured logging utilities.
//!
//! Every log line starts with a `LogContext` prefix followed by an
//! UPPER_SNAKE event key and `key=value` pairs.

use std::fmt;

/// Logging context for one operation, optionally scoped to a connection.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub operation: String,
    pub connection_id: Option<String>,
}

impl LogContext {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            connection_id: None,
        }
    }

    pub fn with_connection(&self, connection_id: &str) -> Self {
        Self {
            operation: self.operation.clone(),
            connection_id: Some(connection_id.to_string()),
        }
    }

    /// Shorthand for `LogContext::new(op).with_connection(id)`.
    pub fn for_connection(operation: &str, connection_id: &str) -> Self {
        Self::new(operation).with_connection(connection_id)
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.connection_id {
            Some(id) => write!(f, "[connection={}] [op={}]", id, self.operation),
            None => write!(f, "[op={}]", self.operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_context_display() {
        let ctx = LogContext::new("load");
        assert_eq!(format!("{}", ctx), "[op=load]");

        let scoped = ctx.with_connection("conn-123");
        assert_eq!(format!("{}", scoped), "[connection=conn-123] [op=load]");
    }

    #[test]
    fn test_for_connection() {
        let ctx = LogContext::for_connection("connect", "abc");
        assert_eq!(ctx.connection_id.as_deref(), Some("abc"));
        assert_eq!(ctx.operation, "connect");
    }
}
