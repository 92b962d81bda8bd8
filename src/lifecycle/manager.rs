//! Connection lifecycle manager.
//!
//! Built on `ConnectionStore`. Owns the live-handle cache; nothing else
//! mutates the list or the cache directly.
//!
//! Per-connection state machine:
//! `Disconnected -> Connecting -> Connected`, `Connecting -> Disconnected`
//! on failure, `Connected -> Disconnected` on disconnect.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{broadcast, Mutex};

use crate::client::{ClientFactory, ClientParams, DatabaseClient};
use crate::config::CoreConfig;
use crate::error::{ClientError, ConnectionError, ConnectionResult};
use crate::lifecycle::negotiation::{ensure_ready, open_client};
use crate::lifecycle::notifier::{LogNotifier, Notifier};
use crate::logging::structured::LogContext;
use crate::security::redact::{mask_secret, redact};
use crate::storage::models::{
    ConnectionLink, ConnectionPatch, ConnectionRecord, ConnectionStatus, NewConnection,
};
use crate::storage::persistent::PersistentStore;
use crate::storage::store::{ConnectionStore, StoreEvent};
use crate::validation::{ensure_unique_name, validate_fields, validate_link, validate_record};

pub struct ConnectionManager {
    store: ConnectionStore,
    factory: Arc<dyn ClientFactory>,
    notifier: Arc<dyn Notifier>,
    clients: RwLock<HashMap<String, Arc<dyn DatabaseClient>>>,
    /// FIFO queue for `add`; tokio's mutex grants the lock in request order.
    add_queue: Mutex<()>,
}

impl ConnectionManager {
    pub fn new(
        backend: Arc<dyn PersistentStore>,
        factory: Arc<dyn ClientFactory>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store: ConnectionStore::new(backend, Arc::new(config)),
            factory,
            notifier: Arc::new(LogNotifier),
            clients: RwLock::new(HashMap::new()),
            add_queue: Mutex::new(()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &ConnectionStore {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    /// Load the persisted list, then connect every record flagged
    /// `auto_connect`, most recently used first.
    ///
    /// Returns the ids that ended up connected.
    pub async fn initialize(&self) -> Vec<String> {
        let records = self.store.load().await;
        let mut connected = Vec::new();

        for record in records.into_iter().filter(|r| r.auto_connect) {
            if self.connect(&record.id).await.is_some() {
                connected.push(record.id);
            }
        }

        log::info!(
            "[op=initialize] AUTO_CONNECT_COMPLETE connected={}",
            connected.len()
        );
        connected
    }

    pub fn get_all(&self) -> Vec<ConnectionRecord> {
        self.store.get_all()
    }

    pub fn get_connection(&self, id: &str) -> Option<ConnectionRecord> {
        self.store.get(id)
    }

    /// Cached live handle, if any.
    pub fn get_client(&self, id: &str) -> Option<Arc<dyn DatabaseClient>> {
        self.clients.read().get(id).cloned()
    }

    /// Create a record. Calls are serialized so two concurrent adds cannot
    /// both pass the name check.
    pub async fn add(&self, new: NewConnection) -> ConnectionResult<ConnectionRecord> {
        let ctx = LogContext::new("add");
        let _turn = self.add_queue.lock().await;

        validate_fields(&new.name, &new.kind, new.api_key.as_deref())
            .and_then(|_| new.links.iter().try_for_each(validate_link))
            .map_err(|e| {
                log::warn!("{} ADD_REJECTED category={} error={}", ctx, e.category(), e);
                e
            })?;

        let record = ConnectionRecord::from_new(new, &self.store.config().schema_version);
        let ctx = ctx.with_connection(&record.id);

        self.store
            .mutate(&ctx, |records| {
                ensure_unique_name(records, &record.name, None)?;
                records.push(record.clone());
                Ok(Some(()))
            })
            .await
            .map_err(|e| {
                log::warn!("{} ADD_REJECTED category={} error={}", ctx, e.category(), e);
                e
            })?;

        log::info!(
            "{} CONNECTION_ADDED name={:?} type={} api_key={}",
            ctx,
            record.name,
            record.connection_type(),
            record.api_key.as_deref().map(mask_secret).unwrap_or_else(|| "none".to_string())
        );
        Ok(record)
    }

    /// Apply a partial update. `Ok(None)` if the id is unknown.
    pub async fn update(
        &self,
        id: &str,
        patch: ConnectionPatch,
    ) -> ConnectionResult<Option<ConnectionRecord>> {
        let ctx = LogContext::for_connection("update", id);

        if let Some(links) = &patch.links {
            links.iter().try_for_each(validate_link)?;
        }
        let recheck = patch.touches_required_fields();

        let updated = self
            .store
            .mutate(&ctx, |records| {
                let Some(index) = records.iter().position(|r| r.id == id) else {
                    return Ok(None);
                };
                if let Some(name) = &patch.name {
                    ensure_unique_name(records, name, Some(id))?;
                }

                let mut candidate = records[index].clone();
                candidate.apply(patch);
                if recheck {
                    validate_record(&candidate)?;
                }
                candidate.last_used = Some(Utc::now());
                records[index] = candidate.clone();
                Ok(Some(candidate))
            })
            .await
            .map_err(|e| {
                log::warn!("{} UPDATE_REJECTED category={} error={}", ctx, e.category(), e);
                e
            })?;

        match &updated {
            Some(record) => log::info!("{} CONNECTION_UPDATED name={:?}", ctx, record.name),
            None => log::debug!("{} UPDATE_SKIPPED reason=not_found", ctx),
        }
        Ok(updated)
    }

    /// Remove a record. Any cached handle is dropped first, connected or not.
    pub async fn delete(&self, id: &str) -> bool {
        let ctx = LogContext::for_connection("delete", id);
        self.evict_client(id).await;

        let removed = self
            .store
            .mutate(&ctx, |records| {
                let before = records.len();
                records.retain(|r| r.id != id);
                Ok((records.len() < before).then_some(()))
            })
            .await;

        match removed {
            Ok(Some(())) => {
                log::info!("{} CONNECTION_DELETED", ctx);
                true
            }
            Ok(None) => {
                log::debug!("{} DELETE_SKIPPED reason=not_found", ctx);
                false
            }
            Err(e) => {
                log::warn!("{} DELETE_FAILED error={}", ctx, e);
                false
            }
        }
    }

    /// Open a live handle. Never fails loudly: every error is reported to
    /// the notifier and turned into `None`.
    pub async fn connect(&self, id: &str) -> Option<ConnectionRecord> {
        let ctx = LogContext::for_connection("connect", id);

        let Some(record) = self.store.get(id) else {
            log::warn!("{} CONNECT_SKIPPED reason=not_found", ctx);
            return None;
        };

        self.set_status(id, ConnectionStatus::Connecting, &ctx).await;
        log::info!(
            "{} CONNECT_START name={:?} type={}",
            ctx,
            record.name,
            record.connection_type()
        );

        match self.establish(&record, &ctx).await {
            Ok(client) => {
                let replaced = self.clients.write().insert(id.to_string(), client);
                if let Some(stale) = replaced {
                    log::info!("{} STALE_HANDLE_CLOSED", ctx);
                    stale.close().await;
                }

                let connected = self
                    .store
                    .mutate(&ctx, |records| {
                        Ok(records.iter_mut().find(|r| r.id == id).map(|r| {
                            r.status = ConnectionStatus::Connected;
                            r.last_used = Some(Utc::now());
                            r.clone()
                        }))
                    })
                    .await;

                match connected {
                    Ok(Some(record)) => {
                        log::info!("{} CONNECTED name={:?}", ctx, record.name);
                        Some(record)
                    }
                    _ => {
                        // Deleted while the handshake was in flight.
                        self.evict_client(id).await;
                        log::warn!("{} CONNECT_ABANDONED reason=record_removed", ctx);
                        None
                    }
                }
            }
            Err(source) => {
                self.evict_client(id).await;
                self.set_status(id, ConnectionStatus::Disconnected, &ctx).await;

                let error = ConnectionError::ConnectFailure {
                    name: record.name.clone(),
                    source,
                };
                let message = redact(&error.to_string(), record.api_key.as_deref());
                log::warn!("{} CONNECT_FAILED error={}", ctx, message);
                self.notifier.error(&message);
                None
            }
        }
    }

    /// Drop the cached handle and mark the record disconnected.
    ///
    /// `false` only for an unknown id. A failed status write is logged by
    /// the store; the handle is gone either way.
    pub async fn disconnect(&self, id: &str) -> bool {
        let ctx = LogContext::for_connection("disconnect", id);
        let had_client = self.evict_client(id).await;

        let updated = self
            .store
            .mutate(&ctx, |records| {
                Ok(records.iter_mut().find(|r| r.id == id).map(|r| {
                    r.status = ConnectionStatus::Disconnected;
                }))
            })
            .await;

        match updated {
            Ok(Some(())) => {
                log::info!("{} DISCONNECTED had_client={}", ctx, had_client);
                true
            }
            Ok(None) => {
                log::debug!("{} DISCONNECT_SKIPPED reason=not_found", ctx);
                false
            }
            Err(e) => {
                log::warn!("{} DISCONNECT_STATUS_FAILED error={}", ctx, e);
                true
            }
        }
    }

    /// Close every cached handle and reset every status in one save.
    /// Returns the number of handles closed.
    pub async fn disconnect_all(&self) -> usize {
        let ctx = LogContext::new("disconnect_all");
        let drained: Vec<Arc<dyn DatabaseClient>> =
            self.clients.write().drain().map(|(_, client)| client).collect();
        let closed = drained.len();
        for client in drained {
            client.close().await;
        }

        let result = self
            .store
            .mutate(&ctx, |records| {
                let mut touched = false;
                for record in records.iter_mut() {
                    if record.status != ConnectionStatus::Disconnected {
                        record.status = ConnectionStatus::Disconnected;
                        touched = true;
                    }
                }
                Ok(touched.then_some(()))
            })
            .await;
        if let Err(e) = result {
            log::warn!("{} RESET_STATUS_FAILED error={}", ctx, e);
        }

        log::info!("{} ALL_DISCONNECTED closed={}", ctx, closed);
        closed
    }

    /// Attach a hyperlink to a record.
    pub async fn add_link(&self, id: &str, label: &str, url: &str) -> ConnectionResult<ConnectionRecord> {
        let link = ConnectionLink {
            name: label.trim().to_string(),
            url: url.trim().to_string(),
        };
        validate_link(&link)?;
        self.edit_links(id, "add_link", |links| {
            links.push(link);
            Ok(())
        })
        .await
    }

    /// Remove the hyperlink at `index`.
    pub async fn remove_link(&self, id: &str, index: usize) -> ConnectionResult<ConnectionRecord> {
        self.edit_links(id, "remove_link", |links| {
            if index >= links.len() {
                return Err(ConnectionError::validation("links", "index out of range"));
            }
            links.remove(index);
            Ok(())
        })
        .await
    }

    async fn edit_links<F>(&self, id: &str, operation: &str, edit: F) -> ConnectionResult<ConnectionRecord>
    where
        F: FnOnce(&mut Vec<ConnectionLink>) -> ConnectionResult<()>,
    {
        let ctx = LogContext::for_connection(operation, id);
        let updated = self
            .store
            .mutate(&ctx, |records| {
                let Some(record) = records.iter_mut().find(|r| r.id == id) else {
                    return Ok(None);
                };
                edit(&mut record.links)?;
                record.last_used = Some(Utc::now());
                Ok(Some(record.clone()))
            })
            .await?;

        let record = updated.ok_or_else(|| ConnectionError::NotFound { id: id.to_string() })?;
        log::info!("{} LINKS_UPDATED count={}", ctx, record.links.len());
        Ok(record)
    }

    /// Build the client and prove it is usable. A client that fails the
    /// readiness probe is closed and never cached.
    async fn establish(
        &self,
        record: &ConnectionRecord,
        ctx: &LogContext,
    ) -> Result<Arc<dyn DatabaseClient>, ClientError> {
        let params = ClientParams::from_record(record, self.store.config())?;
        let client = open_client(self.factory.as_ref(), &params, ctx).await?;

        if let Err(e) = ensure_ready(client.as_ref()).await {
            client.close().await;
            return Err(e);
        }
        Ok(client)
    }

    async fn set_status(&self, id: &str, status: ConnectionStatus, ctx: &LogContext) {
        let result = self
            .store
            .mutate(ctx, |records| {
                Ok(records.iter_mut().find(|r| r.id == id).map(|r| {
                    r.status = status;
                }))
            })
            .await;
        if let Err(e) = result {
            log::warn!("{} STATUS_UPDATE_FAILED status={:?} error={}", ctx, status, e);
        }
    }

    /// Remove and close the cached handle. Returns whether one existed.
    async fn evict_client(&self, id: &str) -> bool {
        let evicted = self.clients.write().remove(id);
        match evicted {
            Some(client) => {
                client.close().await;
                true
            }
            None => false,
        }
    }
}
