// ── Reactive device collection ──
//
// Lock-free reads of the published device map plus push-based change
// notification via `watch` channels. Writes are whole-map swaps; callers
// serialise them (the project holds a writer lock).

use std::sync::Arc;

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::Device;

/// Published device table: object id → shared record, in discovery order.
pub type DeviceMap = IndexMap<String, Arc<Device>>;

/// The current device table and its subscribers.
///
/// Every publish bumps a version counter and pushes the new snapshot to
/// subscribers, even if no record changed.
pub(crate) struct DeviceCollection {
    current: ArcSwap<DeviceMap>,

    /// Version counter, bumped on every publish.
    version: watch::Sender<u64>,

    /// Latest snapshot for subscribers.
    snapshot: watch::Sender<Arc<DeviceMap>>,
}

impl DeviceCollection {
    pub(crate) fn new() -> Self {
        let empty = Arc::new(DeviceMap::new());
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::clone(&empty));

        Self {
            current: ArcSwap::new(empty),
            version,
            snapshot,
        }
    }

    /// Replace the whole table. Returns the new version.
    pub(crate) fn publish(&self, devices: DeviceMap) -> u64 {
        let devices = Arc::new(devices);
        self.current.store(Arc::clone(&devices));
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = devices);
        self.bump_version()
    }

    /// Insert or replace one record. Returns `true` if the id was new.
    pub(crate) fn upsert(&self, device: Device) -> bool {
        let mut next = DeviceMap::clone(&self.current.load());
        let is_new = next
            .insert(device.object_id.clone(), Arc::new(device))
            .is_none();
        self.publish(next);
        is_new
    }

    /// Look up a record by object id.
    pub(crate) fn get(&self, object_id: &str) -> Option<Arc<Device>> {
        self.current.load().get(object_id).cloned()
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> Arc<DeviceMap> {
        self.current.load_full()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<Arc<DeviceMap>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    pub(crate) fn len(&self) -> usize {
        self.current.load().len()
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn bump_version(&self) -> u64 {
        self.version.send_modify(|v| *v += 1);
        *self.version.borrow()
    }
}
