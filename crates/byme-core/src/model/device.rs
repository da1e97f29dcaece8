// ── Device domain types ──

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// One readable/writable attribute of a device on the controller bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status_id: String,
    pub status_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_range: Option<String>,
}

/// Material design icon, either fixed or switching with the on/off state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Icon {
    Single(String),
    Toggle { on: String, off: String },
}

impl Icon {
    pub fn single(icon: &str) -> Self {
        Self::Single(icon.to_owned())
    }

    pub fn toggle(on: &str, off: &str) -> Self {
        Self::Toggle {
            on: on.to_owned(),
            off: off.to_owned(),
        }
    }

    /// Icon to show for the given on/off state.
    pub fn for_state(&self, on: bool) -> &str {
        match self {
            Self::Single(icon) => icon,
            Self::Toggle { on: icon, .. } if on => icon,
            Self::Toggle { off, .. } => off,
        }
    }
}

impl Default for Icon {
    fn default() -> Self {
        Self::single("mdi:home-assistant")
    }
}

/// A controller object and its attributes.
///
/// `object_id` is the stable primary key. The `status` map only grows:
/// refreshes update values in place and never drop a name seen before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub object_id: String,
    pub object_name: String,
    pub object_type: String,
    pub room_ids: Vec<String>,
    pub room_names: Vec<String>,
    /// First entry of `room_names`, or empty.
    pub room_name: String,
    pub status: IndexMap<String, StatusEntry>,
    pub device_type: Platform,
    pub device_class: Option<String>,
    pub device_friendly_name: String,
    pub icon: Icon,
}

impl Device {
    /// A freshly discovered, not yet classified device.
    pub fn new(
        object_id: impl Into<String>,
        object_name: impl Into<String>,
        object_type: impl Into<String>,
    ) -> Self {
        let object_name = object_name.into();
        Self {
            object_id: object_id.into(),
            device_friendly_name: object_name.clone(),
            object_name,
            object_type: object_type.into(),
            room_ids: Vec::new(),
            room_names: Vec::new(),
            room_name: String::new(),
            status: IndexMap::new(),
            device_type: Platform::Others,
            device_class: None,
            icon: Icon::default(),
        }
    }

    /// Current raw value of a named attribute.
    pub fn get_state(&self, name: &str) -> Option<&str> {
        self.status.get(name).map(|s| s.status_value.as_str())
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.status.contains_key(name)
    }

    /// Controller id used to write a named attribute.
    pub fn status_id(&self, name: &str) -> Option<&str> {
        self.status.get(name).map(|s| s.status_id.as_str())
    }

    /// Add or update one attribute.
    ///
    /// An incoming entry without a range keeps the range already known.
    pub fn merge_status(&mut self, name: String, mut entry: StatusEntry) {
        if let Some(existing) = self.status.get(&name) {
            if entry.status_range.is_none() {
                entry.status_range.clone_from(&existing.status_range);
            }
        }
        self.status.insert(name, entry);
    }

    /// Overwrite the value of an existing attribute. Returns `false` when
    /// the device has no attribute by that name.
    pub fn set_state(&mut self, name: &str, value: &str) -> bool {
        match self.status.get_mut(name) {
            Some(entry) => {
                value.clone_into(&mut entry.status_value);
                true
            }
            None => false,
        }
    }

    /// Set room membership; `room_name` follows the first name.
    pub fn set_rooms(&mut self, ids: Vec<String>, names: Vec<String>) {
        self.room_name = names.first().cloned().unwrap_or_default();
        self.room_ids = ids;
        self.room_names = names;
    }
}
