// ── Project: the device table cache ──
//
// Owns the authoritative `object_id → Device` table and the per-platform
// tally. Every mutation runs under one async writer lock, so the poll
// cycle and command writes never interleave. Readers take lock-free
// snapshots.

use std::sync::{Arc, RwLock};

use byme_api::WebClient;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::classify;
use crate::error::CoreError;
use crate::model::{Device, Platform};
use crate::query::{self, DeviceTable};
use crate::rules::RuleSet;
use crate::store::{DeviceCollection, DeviceMap};
use crate::stream::DeviceStream;

/// Bookkeeping only touched while holding the writer lock.
#[derive(Debug, Default)]
struct WriterState {
    /// Table size after the last reclassification.
    classified_count: Option<usize>,
}

/// Outcome of an optimistic local write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub status_id: String,
    pub device_type: Platform,
}

/// The in-memory device table for one controller.
pub struct Project {
    client: Arc<WebClient>,
    devices: DeviceCollection,
    tally: RwLock<IndexMap<Platform, usize>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    writer: Mutex<WriterState>,
    rules: RuleSet,
    ignore: Vec<Platform>,
    global_channel_id: Option<String>,
}

impl Project {
    pub fn new(
        client: Arc<WebClient>,
        rules: RuleSet,
        ignore: Vec<Platform>,
        global_channel_id: Option<String>,
    ) -> Self {
        Self {
            client,
            devices: DeviceCollection::new(),
            tally: RwLock::new(IndexMap::new()),
            last_updated: RwLock::new(None),
            writer: Mutex::new(WriterState::default()),
            rules,
            ignore,
            global_channel_id,
        }
    }

    // ── Update ───────────────────────────────────────────────────────

    /// Refresh the table from the controller.
    ///
    /// Attribute values are re-read on every call. Room membership and
    /// classification only run when the number of devices changed since
    /// the last classification, or when `forced`.
    pub async fn update(&self, forced: bool) -> Result<Arc<DeviceMap>, CoreError> {
        let mut state = self.writer.lock().await;
        let client = self.client.as_ref();

        let working: DeviceTable = self
            .devices
            .snapshot()
            .iter()
            .map(|(id, device)| (id.clone(), Device::clone(device)))
            .collect();

        let (mut working, rows) = query::paginate(
            |acc, start, limit| query::discover_remote_devices(client, acc, start, limit),
            working,
            0,
        )
        .await?;

        let count = working.len();
        let population_changed = state.classified_count != Some(count);
        debug!(rows, devices = count, forced, population_changed, "remote devices refreshed");

        if forced || population_changed {
            let rooms = client.discover_rooms().await?;
            let (enriched, _) = query::paginate(
                |acc, start, limit| query::enrich_room_membership(client, &rooms, acc, start, limit),
                working,
                0,
            )
            .await?;
            working = enriched;

            for device in working.values_mut() {
                self.classify(device);
            }
            self.recount(&working);
            state.classified_count = Some(count);
            info!(devices = count, rooms = rooms.len(), "device table classified");
        }

        self.devices.publish(
            working
                .into_iter()
                .map(|(id, device)| (id, Arc::new(device)))
                .collect(),
        );
        *self.last_updated.write().expect("last_updated lock poisoned") = Some(Utc::now());

        Ok(self.devices.snapshot())
    }

    /// Classify one device in place, then apply the override rules.
    pub fn classify(&self, device: &mut Device) {
        classify::classify(device);
        self.rules.apply(device);
    }

    fn recount(&self, table: &DeviceTable) {
        let mut tally: IndexMap<Platform, usize> = IndexMap::new();
        for device in table.values() {
            *tally.entry(device.device_type).or_default() += 1;
        }
        tally.sort_keys();
        *self.tally.write().expect("tally lock poisoned") = tally;
    }

    // ── Single-device paths ──────────────────────────────────────────

    /// Re-read one device's attributes and merge them into the table.
    pub async fn refresh_device(&self, object_id: &str) -> Result<Arc<Device>, CoreError> {
        let _state = self.writer.lock().await;
        let mut device = self.cloned_device(object_id)?;

        let status = query::refresh_single_device_status(&self.client, object_id).await?;
        for (name, entry) in status {
            device.merge_status(name, entry);
        }

        let device = Arc::new(device);
        self.devices.upsert(Device::clone(&device));
        Ok(device)
    }

    /// Write a value into the cached table before it reaches the server.
    ///
    /// Returns what the caller needs to send the write. The next poll
    /// overwrites the value with whatever the server reports.
    pub async fn apply_local_state(
        &self,
        object_id: &str,
        status_name: &str,
        value: &str,
    ) -> Result<PendingWrite, CoreError> {
        let _state = self.writer.lock().await;
        let mut device = self.cloned_device(object_id)?;

        let status_id = device
            .status_id(status_name)
            .map(str::to_owned)
            .ok_or_else(|| CoreError::StatusNotFound {
                object_id: object_id.to_owned(),
                status_name: status_name.to_owned(),
            })?;
        device.set_state(status_name, value);
        let device_type = device.device_type;
        self.devices.upsert(device);

        Ok(PendingWrite {
            status_id,
            device_type,
        })
    }

    fn cloned_device(&self, object_id: &str) -> Result<Device, CoreError> {
        self.devices
            .get(object_id)
            .map(|d| Device::clone(&d))
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: object_id.to_owned(),
            })
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current published table.
    pub fn devices(&self) -> Arc<DeviceMap> {
        self.devices.snapshot()
    }

    pub fn device(&self, object_id: &str) -> Option<Arc<Device>> {
        self.devices.get(object_id)
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Subscribe to table publishes.
    pub fn subscribe(&self) -> DeviceStream {
        DeviceStream::new(self.devices.subscribe())
    }

    /// Number of publishes so far.
    pub fn version(&self) -> u64 {
        self.devices.version()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self.last_updated.read().expect("last_updated lock poisoned")
    }

    /// Devices of one platform. Empty for ignored platforms.
    pub fn get_by_type(&self, platform: Platform) -> DeviceMap {
        if self.is_ignored(platform) {
            return DeviceMap::new();
        }
        self.devices
            .snapshot()
            .iter()
            .filter(|(_, device)| device.device_type == platform)
            .map(|(id, device)| (id.clone(), Arc::clone(device)))
            .collect()
    }

    /// How many devices a platform has, or `None` when it has none or is
    /// ignored.
    pub fn type_exists(&self, platform: Platform) -> Option<usize> {
        if self.is_ignored(platform) {
            return None;
        }
        self.tally
            .read()
            .expect("tally lock poisoned")
            .get(&platform)
            .copied()
            .filter(|count| *count > 0)
    }

    /// Per-platform counts from the last classification.
    pub fn tally(&self) -> IndexMap<Platform, usize> {
        self.tally.read().expect("tally lock poisoned").clone()
    }

    pub fn is_ignored(&self, platform: Platform) -> bool {
        self.ignore.contains(&platform)
    }

    pub fn global_channel_id(&self) -> Option<&str> {
        self.global_channel_id.as_deref()
    }
}
