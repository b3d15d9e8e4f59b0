// ── Reactive device store ──
//
// Lock-free concurrent storage keyed by device id, with push-based change
// notification via `watch` channels. Readers never block writers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use compit_api::{DeviceState, StateDelta};
use dashmap::DashMap;
use tokio::sync::watch;

use super::merge::apply_delta;
use crate::model::DeviceInstance;

pub type Snapshot = Arc<Vec<Arc<DeviceInstance>>>;

/// `device_id → DeviceInstance` map plus per-device availability.
///
/// Every mutation rebuilds the snapshot that subscribers receive.
/// Snapshots are ordered by device id.
pub struct DeviceStore {
    by_id: DashMap<u64, Arc<DeviceInstance>>,

    /// Devices whose last fetch failed, with the failure text.
    stale: DashMap<u64, String>,

    /// Full snapshot, rebuilt on mutation for efficient subscription.
    snapshot: watch::Sender<Snapshot>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_id: DashMap::new(),
            stale: DashMap::new(),
            snapshot,
        }
    }

    /// Insert an instance. Returns `true` if the id was new.
    pub fn insert(&self, instance: DeviceInstance) -> bool {
        let id = instance.id();
        let is_new = self.by_id.insert(id, Arc::new(instance)).is_none();
        self.stale.remove(&id);
        self.notify();
        is_new
    }

    /// Replace a device's state wholesale. Returns `false` for unknown ids.
    pub fn replace_state(&self, device_id: u64, state: DeviceState) -> bool {
        let Some(mut entry) = self.by_id.get_mut(&device_id) else {
            return false;
        };
        Arc::make_mut(entry.value_mut()).state = state;
        drop(entry);

        self.stale.remove(&device_id);
        self.notify();
        true
    }

    /// Merge a push delta in place. Returns `false` for unknown ids.
    pub fn merge(&self, device_id: u64, delta: &StateDelta, now: DateTime<Utc>) -> bool {
        let Some(mut entry) = self.by_id.get_mut(&device_id) else {
            return false;
        };
        apply_delta(&mut Arc::make_mut(entry.value_mut()).state, delta, now);
        drop(entry);

        self.notify();
        true
    }

    pub fn get(&self, device_id: u64) -> Option<Arc<DeviceInstance>> {
        self.by_id.get(&device_id).map(|r| Arc::clone(r.value()))
    }

    pub fn contains(&self, device_id: u64) -> bool {
        self.by_id.contains_key(&device_id)
    }

    // ── Availability ─────────────────────────────────────────────────

    pub fn mark_stale(&self, device_id: u64, reason: impl Into<String>) {
        if self.by_id.contains_key(&device_id) {
            self.stale.insert(device_id, reason.into());
            self.notify();
        }
    }

    pub fn mark_fresh(&self, device_id: u64) {
        if self.stale.remove(&device_id).is_some() {
            self.notify();
        }
    }

    /// Known and not marked stale.
    pub fn is_available(&self, device_id: u64) -> bool {
        self.by_id.contains_key(&device_id) && !self.stale.contains_key(&device_id)
    }

    /// Failure text of the last fetch for an unavailable device.
    pub fn stale_reason(&self, device_id: u64) -> Option<String> {
        self.stale.get(&device_id).map(|r| r.value().clone())
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Get the current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn notify(&self) {
        let mut values: Vec<Arc<DeviceInstance>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_unstable_by_key(|d| d.id());
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use compit_api::{Device, DeviceDefinition};
    use serde_json::json;

    pub(crate) fn instance(id: u64, target: i64) -> DeviceInstance {
        let device: Device = serde_json::from_value(json!({
            "id": id, "class": 10, "type": 5, "label": format!("Device {id}")
        }))
        .unwrap();
        let definition: DeviceDefinition = serde_json::from_value(json!({
            "Name": "Nano Color 2", "Code": 5, "Class": 10, "Parameters": []
        }))
        .unwrap();
        let state: DeviceState = serde_json::from_value(json!({
            "params": [{ "code": "__tpokzadana", "value": target }]
        }))
        .unwrap();
        DeviceInstance::new(1, device, Arc::new(definition), state)
    }

    #[test]
    fn insert_reports_new_ids() {
        let store = DeviceStore::new();
        assert!(store.insert(instance(42, 21)));
        assert!(!store.insert(instance(42, 22)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_is_sorted_by_id() {
        let store = DeviceStore::new();
        store.insert(instance(43, 20));
        store.insert(instance(42, 21));

        let ids: Vec<u64> = store.snapshot().iter().map(|d| d.id()).collect();
        assert_eq!(ids, vec![42, 43]);
    }

    #[test]
    fn merge_does_not_disturb_old_snapshots() {
        let store = DeviceStore::new();
        store.insert(instance(42, 21));
        let before = store.snapshot();

        let delta: StateDelta = serde_json::from_value(json!({
            "params": [{ "code": "__tpokzadana", "value": 22 }]
        }))
        .unwrap();
        assert!(store.merge(42, &delta, Utc::now()));

        assert_eq!(before[0].param("__tpokzadana").unwrap().value, json!(21));
        assert_eq!(
            store.get(42).unwrap().param("__tpokzadana").unwrap().value,
            json!(22)
        );
    }

    #[test]
    fn merge_and_replace_ignore_unknown_ids() {
        let store = DeviceStore::new();
        assert!(!store.merge(7, &StateDelta::default(), Utc::now()));
        assert!(!store.replace_state(7, DeviceState::default()));
        assert!(store.is_empty());
    }

    #[test]
    fn stale_devices_are_unavailable_until_refreshed() {
        let store = DeviceStore::new();
        store.insert(instance(42, 21));
        assert!(store.is_available(42));

        store.mark_stale(42, "timeout");
        assert!(!store.is_available(42));
        assert_eq!(store.stale_reason(42).as_deref(), Some("timeout"));

        store.replace_state(42, DeviceState::default());
        assert!(store.is_available(42));
        assert!(!store.is_available(99));
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = DeviceStore::new();
        let mut rx = store.subscribe();

        store.insert(instance(42, 21));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        store.mark_stale(42, "timeout");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);
        assert!(!store.is_available(42));
    }
}
