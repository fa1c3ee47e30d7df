//! Device set diffing
//!
//! Identity is the device `id` alone. Metadata changes (renames, default
//! flips) never produce events; the newer record simply replaces the older
//! one when the set is rebuilt.

use std::collections::{HashMap, HashSet};

use crate::device::AudioDevice;

/// Devices currently known to be attached, keyed by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSet {
    devices: HashMap<String, AudioDevice>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from an enumeration. A repeated id keeps its last entry.
    pub fn from_devices<'a, I>(devices: I) -> Self
    where
        I: IntoIterator<Item = &'a AudioDevice>,
    {
        let devices = devices
            .into_iter()
            .map(|device| (device.id.clone(), device.clone()))
            .collect();
        Self { devices }
    }

    pub fn get(&self, id: &str) -> Option<&AudioDevice> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn clear(&mut self) {
        self.devices.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &AudioDevice> {
        self.devices.values()
    }

    /// Copy of the set, sorted by id
    pub fn to_vec(&self) -> Vec<AudioDevice> {
        let mut devices: Vec<_> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.id.cmp(&b.id));
        devices
    }
}

/// Result of a single diff pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub added: Vec<AudioDevice>,
    pub removed: Vec<AudioDevice>,
}

impl Delta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Compute which devices appeared and disappeared between `previous` and
/// `current`.
///
/// `added` follows the order of `current` (one entry per id, carrying the
/// last-seen record); `removed` is sorted by id.
pub fn diff(previous: &DeviceSet, current: &[AudioDevice]) -> Delta {
    let next = DeviceSet::from_devices(current);

    let mut seen = HashSet::new();
    let added = current
        .iter()
        .filter(|device| !previous.contains(&device.id))
        .filter(|device| seen.insert(device.id.as_str()))
        .filter_map(|device| next.get(&device.id).cloned())
        .collect();

    let mut removed: Vec<_> = previous
        .iter()
        .filter(|device| !next.contains(&device.id))
        .cloned()
        .collect();
    removed.sort_by(|a, b| a.id.cmp(&b.id));

    Delta { added, removed }
}
