//! Canonical in-memory connection list.
//!
//! `ConnectionStore` owns the records, migrates them on load and funnels
//! every mutation through one persist-and-notify path. Callers only ever
//! receive copies.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use crate::config::CoreConfig;
use crate::error::{ConnectionResult, StoreError};
use crate::logging::structured::LogContext;
use crate::migration::migrate_all;
use crate::storage::models::{ConnectionRecord, ConnectionStatus, RecordDocument};
use crate::storage::persistent::PersistentStore;
use crate::validation::name_collisions;

/// Capacity of the change channel. Subscribers that lag simply re-pull.
const EVENT_CAPACITY: usize = 64;

/// Fired after every mutation of the connection list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    Changed,
}

#[derive(Debug, Default)]
struct StoreState {
    records: Vec<ConnectionRecord>,
    /// Entries migration could not classify; written back untouched.
    retained: Vec<RecordDocument>,
}

pub struct ConnectionStore {
    backend: Arc<dyn PersistentStore>,
    config: Arc<CoreConfig>,
    state: RwLock<StoreState>,
    /// Serializes backend writes; each write snapshots the list while
    /// holding it, so the durable copy never goes backwards.
    write_gate: Mutex<()>,
    events: broadcast::Sender<StoreEvent>,
}

impl ConnectionStore {
    pub fn new(backend: Arc<dyn PersistentStore>, config: Arc<CoreConfig>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            config,
            state: RwLock::new(StoreState::default()),
            write_gate: Mutex::new(()),
            events,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Read, migrate and adopt the persisted list.
    ///
    /// Absent or malformed data yields an empty list. If migration changed
    /// anything the result is written back; a failed write-back is logged
    /// and the in-memory list stays authoritative.
    pub async fn load(&self) -> Vec<ConnectionRecord> {
        let ctx = LogContext::new("load");

        let entries = match self.backend.load(&self.config.storage_key).await {
            Ok(Some(bytes)) => decode_entries(&bytes, &ctx),
            Ok(None) => {
                log::debug!("{} STORE_EMPTY key={}", ctx, self.config.storage_key);
                Vec::new()
            }
            Err(e) => {
                log::error!("{} STORE_READ_FAILED error={}", ctx, e);
                Vec::new()
            }
        };

        let report = migrate_all(entries, &self.config, &ctx);
        let changed = report.changed();

        let collisions = {
            let mut state = self.state.write();
            state.records = report.records;
            for record in state.records.iter_mut() {
                record.status = ConnectionStatus::Disconnected;
            }
            sort_most_recent_first(&mut state.records);
            state.retained = report.retained;
            name_collisions(&state.records)
        };

        // Both records are kept; renaming either one resolves it.
        for (existing_id, colliding_id) in &collisions {
            log::warn!(
                "{} NAME_COLLISION_ON_LOAD existing_id={} colliding_id={}",
                ctx,
                existing_id,
                colliding_id
            );
        }

        if changed {
            match self.persist().await {
                Ok(()) => log::info!("{} MIGRATION_PERSISTED", ctx),
                Err(e) => log::warn!("{} MIGRATION_PERSIST_FAILED error={}", ctx, e),
            }
        }

        self.get_all()
    }

    /// Copies of all records, most recently used first.
    pub fn get_all(&self) -> Vec<ConnectionRecord> {
        let mut records = self.state.read().records.clone();
        sort_most_recent_first(&mut records);
        records
    }

    pub fn get(&self, id: &str) -> Option<ConnectionRecord> {
        self.state.read().records.iter().find(|r| r.id == id).cloned()
    }

    /// Entries retained unversioned because migration could not classify them.
    pub fn unclassified(&self) -> Vec<RecordDocument> {
        self.state.read().retained.clone()
    }

    /// Replace the whole list, persist it and notify subscribers.
    ///
    /// Subscribers are notified even when the write fails: the in-memory
    /// list is the session's source of truth.
    pub async fn save(&self, records: Vec<ConnectionRecord>) -> ConnectionResult<()> {
        self.state.write().records = records;
        let result = self.persist().await;
        self.notify();
        Ok(result?)
    }

    /// Read-check-write against the current list in one step.
    ///
    /// `f` runs under the write lock. `Ok(None)` means nothing changed and
    /// nothing is persisted; `Ok(Some(_))` is persisted and announced. A
    /// failed write is logged and does not fail the mutation.
    pub async fn mutate<T, F>(&self, ctx: &LogContext, f: F) -> ConnectionResult<Option<T>>
    where
        F: FnOnce(&mut Vec<ConnectionRecord>) -> ConnectionResult<Option<T>>,
    {
        let outcome = {
            let mut state = self.state.write();
            f(&mut state.records)?
        };

        if outcome.is_some() {
            if let Err(e) = self.persist().await {
                log::warn!("{} PERSIST_FAILED error={}", ctx, e);
            }
            self.notify();
        }

        Ok(outcome)
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let _gate = self.write_gate.lock().await;

        let bytes = {
            let state = self.state.read();
            let mut docs: Vec<Value> = Vec::with_capacity(state.records.len() + state.retained.len());
            for record in &state.records {
                docs.push(serde_json::to_value(RecordDocument::from(record))?);
            }
            for doc in &state.retained {
                docs.push(serde_json::to_value(doc)?);
            }
            serde_json::to_vec(&docs)?
        };

        self.backend.save(&self.config.storage_key, &bytes).await
    }

    fn notify(&self) {
        // No receivers is fine.
        let _ = self.events.send(StoreEvent::Changed);
    }
}

fn decode_entries(bytes: &[u8], ctx: &LogContext) -> Vec<Value> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(entries)) => entries,
        Ok(other) => {
            log::warn!(
                "{} STORE_MALFORMED reason=not_a_list kind={}",
                ctx,
                json_kind(&other)
            );
            Vec::new()
        }
        Err(e) => {
            log::warn!("{} STORE_MALFORMED error={}", ctx, e);
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Most recently used first; records never used go last.
pub fn sort_most_recent_first(records: &mut [ConnectionRecord]) {
    records.sort_by(|a, b| b.last_used.cmp(&a.last_used));
}
