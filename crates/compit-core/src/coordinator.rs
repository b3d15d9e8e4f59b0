// ── State coordinator ──
//
// Owns the `device_id → DeviceInstance` store for one account and keeps it
// in sync with the vendor cloud, either by periodic REST refresh or by
// merging WebSocket deltas. Handles authentication, catalog loading,
// background tasks, parameter writes and teardown.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use compit_api::websocket::{PushConfig, PushHandle, Subscription};
use compit_api::{CompitClient, Device, Param, PushEvent, StateUpdate, SystemInfo, TransportConfig};
use serde_json::Value;
use strum::Display;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{CoordinatorConfig, SyncMode};
use crate::definitions::{self, DefinitionIndex};
use crate::entity::{self, Entities};
use crate::error::CoreError;
use crate::model::DeviceInstance;
use crate::store::{DeviceStore, Snapshot};
use crate::stream::DeviceStream;

// ── SyncStatus ───────────────────────────────────────────────────

/// Refresh lifecycle observable by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SyncStatus {
    Idle,
    Fetching,
    Updated,
    Failed,
    /// Credentials were rejected; nothing recovers without new ones.
    ReauthRequired,
}

// ── Coordinator ──────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<CoordinatorInner>`. Every clone sees the same
/// store, status and background tasks.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    client: CompitClient,
    definitions: ArcSwap<DefinitionIndex>,
    gates: ArcSwap<SystemInfo>,
    store: DeviceStore,
    status: watch::Sender<SyncStatus>,
    last_update_success: AtomicBool,
    last_updated: ArcSwap<Option<DateTime<Utc>>>,
    /// Serializes refresh cycles.
    refresh_lock: Mutex<()>,
    cancel: CancellationToken,
    push: Mutex<Option<PushHandle>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator without touching the network. Call
    /// [`start`](Self::start) (or use [`setup`](Self::setup)) to go live.
    pub fn new(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let client = CompitClient::new(
            config.api_url.clone(),
            config.auth_scheme,
            &TransportConfig::with_timeout(config.timeout),
        )?;
        let (status, _) = watch::channel(SyncStatus::Idle);

        Ok(Self {
            inner: Arc::new(CoordinatorInner {
                config,
                client,
                definitions: ArcSwap::from_pointee(DefinitionIndex::default()),
                gates: ArcSwap::from_pointee(SystemInfo::default()),
                store: DeviceStore::new(),
                status,
                last_update_success: AtomicBool::new(false),
                last_updated: ArcSwap::from_pointee(None),
                refresh_lock: Mutex::new(()),
                cancel: CancellationToken::new(),
                push: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Build, authenticate, load definitions, run the first refresh and
    /// spawn the background tasks for the configured mode.
    pub async fn setup(config: CoordinatorConfig) -> Result<Self, CoreError> {
        let coordinator = Self::new(config)?;
        coordinator.start().await?;
        Ok(coordinator)
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &CompitClient {
        &self.inner.client
    }

    pub fn mode(&self) -> SyncMode {
        self.inner.config.mode
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Go live. Authentication and catalog failures are fatal; a failed
    /// first refresh is logged and left to the next cycle unless it is an
    /// authentication failure.
    pub async fn start(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;

        let topology = self
            .inner
            .client
            .authenticate(&config.email, &config.password)
            .await
            .map_err(|e| {
                warn!(error = %e, "authentication failed");
                CoreError::from(e)
            })?;
        info!(
            gates = topology.gates.len(),
            devices = topology.devices().count(),
            "authenticated"
        );
        self.inner.gates.store(Arc::new(topology));

        let index =
            definitions::load_index(&config.catalog, &config.language, &self.inner.client).await?;
        self.inner.definitions.store(Arc::new(index));

        match self.refresh().await {
            Ok(()) => {}
            Err(e) if e.is_auth_error() => return Err(e),
            Err(e) => warn!(error = %e, "first refresh incomplete"),
        }

        let mut handles = self.inner.task_handles.lock().await;
        match config.mode {
            SyncMode::Polling => {
                let coordinator = self.clone();
                let cancel = self.inner.cancel.clone();
                handles.push(tokio::spawn(refresh_task(
                    coordinator,
                    config.scan_interval,
                    cancel,
                )));
            }
            SyncMode::Push => {
                let token = self.inner.client.token().ok_or_else(|| {
                    CoreError::Internal("session token missing after authentication".into())
                })?;
                let push_config = PushConfig {
                    url: config.ws_url.clone(),
                    heartbeat_interval: config.heartbeat_interval,
                    resubscribe_interval: config.resubscribe_interval,
                    reconnect_delay: config.reconnect_delay,
                };
                // Own token: the socket must outlive the tasks during shutdown.
                let handle = PushHandle::spawn(
                    push_config,
                    token,
                    self.subscription(),
                    CancellationToken::new(),
                );
                let events = handle.subscribe();
                *self.inner.push.lock().await = Some(handle);

                let coordinator = self.clone();
                let cancel = self.inner.cancel.clone();
                handles.push(tokio::spawn(push_bridge_task(coordinator, events, cancel)));
            }
        }

        info!(mode = %config.mode, devices = self.inner.store.len(), "coordinator started");
        Ok(())
    }

    /// Cancel and await every background task, then close the socket.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "background task ended abnormally");
            }
        }
        drop(handles);

        if let Some(push) = self.inner.push.lock().await.take() {
            push.shutdown().await;
        }
        debug!("coordinator shut down");
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// One poll cycle over every topology device.
    ///
    /// A failing device is marked unavailable and the cycle continues; the
    /// cycle then reports `UpdateFailed`. An authentication failure aborts
    /// immediately and publishes `ReauthRequired`.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let _guard = self.inner.refresh_lock.lock().await;
        self.inner.status.send_replace(SyncStatus::Fetching);

        let result = self.refresh_all().await;
        match &result {
            Ok(()) => {
                self.record_success();
                self.inner.status.send_replace(SyncStatus::Updated);
                debug!(devices = self.inner.store.len(), "refresh complete");
            }
            Err(e) if e.is_auth_error() => {
                self.inner.last_update_success.store(false, Ordering::Release);
                self.inner.status.send_replace(SyncStatus::ReauthRequired);
                error!(error = %e, "credentials rejected, re-authentication required");
                return result;
            }
            Err(e) => {
                self.inner.last_update_success.store(false, Ordering::Release);
                self.inner.status.send_replace(SyncStatus::Failed);
                warn!(error = %e, "refresh failed");
            }
        }
        self.inner.status.send_replace(SyncStatus::Idle);
        result
    }

    /// On-demand refresh (after a write, or when a consumer asks).
    pub async fn request_refresh(&self) -> Result<(), CoreError> {
        self.refresh().await
    }

    /// Fetch and replace the state of a single known device.
    pub async fn refresh_device(&self, device_id: u64) -> Result<(), CoreError> {
        if !self.inner.store.contains(device_id) {
            return Err(CoreError::DeviceNotFound { device_id });
        }
        match self.inner.client.get_state(device_id).await {
            Ok(state) => {
                self.inner.store.replace_state(device_id, state);
                self.record_success();
                Ok(())
            }
            Err(e) => {
                let err = CoreError::from(e);
                self.inner.store.mark_stale(device_id, err.to_string());
                Err(err)
            }
        }
    }

    async fn refresh_all(&self) -> Result<(), CoreError> {
        let topology = self.inner.gates.load_full();
        let mut failures = Vec::new();

        for gate in &topology.gates {
            for device in &gate.devices {
                match self.fetch_device(gate.id, device).await {
                    Ok(()) => {}
                    Err(e) if e.is_auth_error() => return Err(e),
                    Err(e) => {
                        warn!(device_id = device.id, error = %e, "device refresh failed");
                        self.inner.store.mark_stale(device.id, e.to_string());
                        failures.push(format!("device {}: {e}", device.id));
                    }
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CoreError::UpdateFailed {
                message: failures.join("; "),
            })
        }
    }

    /// Replace a known device's state, or create the instance on first sight.
    async fn fetch_device(&self, gate_id: u64, device: &Device) -> Result<(), CoreError> {
        if self.inner.store.contains(device.id) {
            let state = self.inner.client.get_state(device.id).await?;
            self.inner.store.replace_state(device.id, state);
            return Ok(());
        }

        let definition = self
            .inner
            .definitions
            .load()
            .for_device(device)
            .ok_or(CoreError::DefinitionMissing {
                class: device.class,
                code: device.device_type,
                device_id: device.id,
            })?;
        let state = self.inner.client.get_state(device.id).await?;
        debug!(device_id = device.id, model = %definition.name, "device discovered");
        self.inner
            .store
            .insert(DeviceInstance::new(gate_id, device.clone(), definition, state));
        Ok(())
    }

    // ── Push merge ───────────────────────────────────────────────

    /// Apply a pushed delta. Unknown gates and devices are ignored; a
    /// device seen for the first time gets a full REST fetch instead.
    pub async fn on_message(&self, update: &StateUpdate) -> Result<(), CoreError> {
        let topology = self.inner.gates.load_full();
        let gate = match update.gate_id {
            Some(gate_id) => topology.gates.iter().find(|g| g.id == gate_id),
            None => topology
                .gates
                .iter()
                .find(|g| g.devices.iter().any(|d| d.id == update.device_id)),
        };
        let Some(gate) = gate else {
            debug!(gate_id = ?update.gate_id, device_id = update.device_id, "update for unknown gate ignored");
            return Ok(());
        };
        let Some(device) = gate.devices.iter().find(|d| d.id == update.device_id) else {
            debug!(gate_id = gate.id, device_id = update.device_id, "update for unknown device ignored");
            return Ok(());
        };

        if self.inner.store.merge(device.id, &update.state, Utc::now()) {
            self.inner.store.mark_fresh(device.id);
            self.record_success();
            return Ok(());
        }

        self.fetch_device(gate.id, device).await.inspect_err(|e| {
            warn!(device_id = device.id, error = %e, "could not load pushed device");
        })?;
        self.record_success();
        Ok(())
    }

    // ── Writes ───────────────────────────────────────────────────

    /// Write a parameter value, then refresh (everything when polling,
    /// only this device when pushing). Nothing is updated optimistically.
    pub async fn set_parameter(
        &self,
        device_id: u64,
        code: &str,
        value: impl Into<Value>,
    ) -> Result<(), CoreError> {
        let instance = self
            .inner
            .store
            .get(device_id)
            .ok_or(CoreError::DeviceNotFound { device_id })?;
        if instance.definition.parameter(code).is_none() {
            return Err(CoreError::ParameterNotFound {
                device_id,
                code: code.to_owned(),
            });
        }

        if let Err(e) = self
            .inner
            .client
            .update_device_parameter(device_id, code, value)
            .await
        {
            warn!(device_id, code, error = %e, "parameter write failed");
            return Err(CoreError::WriteRejected {
                device_id,
                code: code.to_owned(),
                message: e.to_string(),
            });
        }

        let refreshed = match self.inner.config.mode {
            SyncMode::Polling => self.request_refresh().await,
            SyncMode::Push => self.refresh_device(device_id).await,
        };
        if let Err(e) = refreshed {
            warn!(device_id, code, error = %e, "refresh after write failed");
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn device(&self, device_id: u64) -> Option<Arc<DeviceInstance>> {
        self.inner.store.get(device_id)
    }

    pub fn param(&self, device_id: u64, code: &str) -> Option<Param> {
        self.inner.store.get(device_id)?.param(code).cloned()
    }

    /// Current devices keyed by id.
    pub fn data(&self) -> BTreeMap<u64, Arc<DeviceInstance>> {
        self.inner
            .store
            .snapshot()
            .iter()
            .map(|d| (d.id(), Arc::clone(d)))
            .collect()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.inner.store.snapshot()
    }

    pub fn gates(&self) -> Arc<SystemInfo> {
        self.inner.gates.load_full()
    }

    pub fn definitions(&self) -> Arc<DefinitionIndex> {
        self.inner.definitions.load_full()
    }

    /// Device known and its last fetch succeeded.
    pub fn is_available(&self, device_id: u64) -> bool {
        self.inner.store.is_available(device_id)
    }

    /// Why the device is unavailable, if its last fetch failed.
    pub fn unavailable_reason(&self, device_id: u64) -> Option<String> {
        self.inner.store.stale_reason(device_id)
    }

    pub fn last_update_success(&self) -> bool {
        self.inner.last_update_success.load(Ordering::Acquire)
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        **self.inner.last_updated.load()
    }

    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Change notifications as store snapshots.
    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.inner.store.subscribe())
    }

    /// Entity adapters for every device currently in the store.
    pub fn entities(&self) -> Entities {
        Entities::discover(self)
    }

    /// Push channels and parameter group for the current topology.
    pub fn subscription(&self) -> Subscription {
        let topology = self.inner.gates.load();
        let selected_params = self
            .inner
            .store
            .snapshot()
            .iter()
            .map(|d| (d.id(), entity::exposed_codes(d)))
            .collect();

        Subscription {
            gate_ids: topology.gates.iter().map(|g| g.id).collect(),
            device_ids: topology.devices().map(|(_, d)| d.id).collect(),
            selected_params,
        }
    }

    fn record_success(&self) {
        self.inner.last_update_success.store(true, Ordering::Release);
        self.inner.last_updated.store(Arc::new(Some(Utc::now())));
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Periodically refresh every device until cancelled or re-auth is needed.
async fn refresh_task(coordinator: Coordinator, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match coordinator.refresh().await {
                    Ok(()) => {}
                    Err(e) if e.is_auth_error() => {
                        error!(error = %e, "stopping periodic refresh");
                        break;
                    }
                    // Already logged by refresh(); retried next tick.
                    Err(_) => {}
                }
            }
        }
    }
    debug!("refresh task exiting");
}

/// Feed push events into the store. A lagged receiver or a reconnect
/// triggers a full REST resync, since deltas may have been missed.
async fn push_bridge_task(
    coordinator: Coordinator,
    mut events: tokio::sync::broadcast::Receiver<Arc<PushEvent>>,
    cancel: CancellationToken,
) {
    let mut was_disconnected = false;

    loop {
        let event = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => event,
        };

        let resync = match event {
            Ok(event) => match event.as_ref() {
                PushEvent::StateUpdate(update) => match coordinator.on_message(update).await {
                    Err(e) if e.is_auth_error() => {
                        coordinator.inner.status.send_replace(SyncStatus::ReauthRequired);
                        error!(error = %e, "stopping push bridge");
                        break;
                    }
                    // Other failures are logged by on_message.
                    _ => false,
                },
                PushEvent::Connected => std::mem::take(&mut was_disconnected),
                PushEvent::Listening => {
                    debug!("push session listening");
                    false
                }
                PushEvent::Disconnected { reason } => {
                    info!(reason = %reason, "push session disconnected");
                    was_disconnected = true;
                    false
                }
            },
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "push bridge lagged, resyncing");
                true
            }
            Err(RecvError::Closed) => break,
        };

        if resync {
            if coordinator
                .refresh()
                .await
                .as_ref()
                .is_err_and(|e| e.is_auth_error())
            {
                break;
            }
            if let Some(push) = coordinator.inner.push.lock().await.as_ref() {
                push.set_subscription(coordinator.subscription());
            }
        }
    }
    debug!("push bridge exiting");
}
