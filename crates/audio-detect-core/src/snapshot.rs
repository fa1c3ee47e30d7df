//! Device snapshotter
//!
//! Wraps a [`DeviceEnumerator`] and normalizes its raw descriptors into
//! canonical [`AudioDevice`] records. Stateless: every call goes straight to
//! the enumerator, and failures are returned as-is without retrying.

use std::sync::Arc;

use crate::device::{AudioDevice, DeviceType, RawDevice};
use crate::error::{DetectError, PlatformError, Result};
use crate::traits::DeviceEnumerator;

#[derive(Clone)]
pub struct Snapshotter {
    enumerator: Arc<dyn DeviceEnumerator>,
}

impl Snapshotter {
    pub fn new<E: DeviceEnumerator>(enumerator: E) -> Self {
        Self {
            enumerator: Arc::new(enumerator),
        }
    }

    /// Build a snapshotter over a plain enumeration function
    pub fn from_fn<F>(enumerate: F) -> Self
    where
        F: Fn() -> std::result::Result<Vec<RawDevice>, PlatformError> + Send + Sync + 'static,
    {
        Self::new(enumerate)
    }

    pub fn backend(&self) -> &str {
        self.enumerator.backend()
    }

    /// Enumerate and normalize the currently attached devices.
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::Enumeration`] if the platform call fails or
    /// reports a descriptor that cannot be normalized.
    pub fn snapshot(&self) -> Result<Vec<AudioDevice>> {
        let raw = self.enumerator.enumerate()?;
        let devices = normalize(raw)?;
        tracing::debug!(
            backend = self.backend(),
            count = devices.len(),
            "Device snapshot taken"
        );
        Ok(devices)
    }
}

impl std::fmt::Debug for Snapshotter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshotter")
            .field("backend", &self.backend())
            .finish()
    }
}

/// Normalize a raw enumeration result, preserving its order
pub fn normalize(raw: Vec<RawDevice>) -> Result<Vec<AudioDevice>> {
    raw.into_iter()
        .enumerate()
        .map(|(index, device)| normalize_one(index, device))
        .collect()
}

fn normalize_one(index: usize, raw: RawDevice) -> Result<AudioDevice> {
    let device_type = raw.device_type.ok_or_else(|| {
        DetectError::Enumeration(format!("descriptor #{index} has no direction"))
    })?;

    let name = raw.name.trim();
    let raw_id = raw.id.as_deref().map(str::trim).filter(|id| !id.is_empty());

    let id = match (raw_id, name.is_empty()) {
        (Some(id), _) => id.to_string(),
        (None, false) => derived_id(device_type, name),
        (None, true) => {
            return Err(DetectError::Enumeration(format!(
                "descriptor #{index} has neither an id nor a name"
            )))
        }
    };

    let name = if name.is_empty() {
        format!("Unknown {} device", device_type)
    } else {
        name.to_string()
    };

    Ok(AudioDevice {
        id,
        name,
        device_type,
        is_default: raw.is_default,
        manufacturer: clean(raw.manufacturer),
        vendor_id: raw.vendor_id,
        product_id: raw.product_id,
        serial_number: clean(raw.serial_number),
    })
}

/// Fallback identity for backends that only expose a name
fn derived_id(device_type: DeviceType, name: &str) -> String {
    format!("{}:{}", device_type, name)
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
