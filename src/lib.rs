//! Weaviate Studio Core - connection registry and filter compiler
//!
//! This crate holds the editor-independent logic of the Weaviate Studio
//! extension. The implementation prioritizes:
//!
//! 1. **Durability of user data** - tolerant loading, versioned migration
//! 2. **Logging** - every decision point logged with connection context
//! 3. **Isolation** - a failed record or connect never takes down the rest
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `storage` - record models, the persistent-store seam and `ConnectionStore`
//! - `migration` - upgrade of persisted records across schema versions
//! - `validation` - required-field and name-uniqueness checks
//! - `lifecycle` - `ConnectionManager`: add/update/delete, connect/disconnect
//! - `client` - the database client seam and construction parameters
//! - `filter` - filter group trees and their compilation to backend queries
//! - `security` - credential redaction for logs and user messages
//! - `config` - storage key, schema version, defaults and env overrides
//! - `logging` - structured logging with connection context

use std::path::Path;
use std::sync::Arc;

pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod logging;
pub mod migration;
pub mod security;
pub mod storage;
pub mod validation;

pub use client::{ClientFactory, DatabaseClient};
pub use config::CoreConfig;
pub use error::{ClientError, ConnectionError, ConnectionResult, StoreError};
pub use filter::{compile, render_text, BackendQuery, Filter, FilterGroup, GroupOperator};
pub use lifecycle::{ConnectionManager, Notifier};
pub use storage::{
    ConnectionKind, ConnectionPatch, ConnectionRecord, ConnectionStatus, NewConnection,
    PersistentStore, StoreEvent,
};

/// Initialize the process-wide logger. Safe to call more than once.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_millis()
        .try_init();
}

/// Build a manager backed by JSON files under `storage_dir`.
///
/// Configuration comes from `config_path` when given, otherwise from the
/// environment. The returned manager has not loaded anything yet; call
/// `initialize` to load the list and auto-connect.
pub fn open_file_backed(
    storage_dir: &Path,
    config_path: Option<&Path>,
    factory: Arc<dyn ClientFactory>,
) -> ConnectionResult<ConnectionManager> {
    init_logger();

    let config = CoreConfig::load(config_path)?;
    log::info!(
        "CORE_OPEN storage_dir={} storage_key={} schema_version={}",
        storage_dir.display(),
        config.storage_key,
        config.schema_version
    );

    let backend = Arc::new(storage::FileStore::new(storage_dir));
    Ok(ConnectionManager::new(backend, factory, config))
}
