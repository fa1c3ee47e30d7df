use std::collections::HashMap;

use audio_detect_core::{
    AudioDevice, DetectError, DeviceEnumerator, DeviceType, PlatformError, RawDevice, Snapshotter,
};
use cpal::traits::{DeviceTrait, HostTrait};

use crate::platform;

/// Enumerates audio endpoints through a cpal host
///
/// cpal 0.15 exposes no persistent endpoint id, so ids are built from the
/// host, the direction and the device name. Devices sharing a name within
/// one direction get an ordinal suffix (`#2`, `#3`, ...) in enumeration
/// order.
#[derive(Debug, Clone, Copy)]
pub struct CpalEnumerator {
    host_id: cpal::HostId,
}

impl CpalEnumerator {
    /// Enumerator over the platform's default host
    pub fn default_host() -> Self {
        Self {
            host_id: cpal::default_host().id(),
        }
    }

    /// Enumerator over a specific host
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::PlatformNotSupported`] if the host is not
    /// available on this machine.
    pub fn with_host(host_id: cpal::HostId) -> Result<Self, DetectError> {
        if cpal::available_hosts().contains(&host_id) {
            Ok(Self { host_id })
        } else {
            Err(DetectError::PlatformNotSupported(format!(
                "cpal host {} is not available",
                host_id.name()
            )))
        }
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host_id
    }
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        Self::default_host()
    }
}

impl DeviceEnumerator for CpalEnumerator {
    fn enumerate(&self) -> Result<Vec<RawDevice>, PlatformError> {
        let host = cpal::host_from_id(self.host_id)
            .map_err(|e| PlatformError::new(format!("host unavailable: {}", e)))?;

        let default_input = host.default_input_device().and_then(|d| d.name().ok());
        let default_output = host.default_output_device().and_then(|d| d.name().ok());

        let inputs = host
            .input_devices()
            .map_err(|e| PlatformError::new(format!("failed to list input devices: {}", e)))?;
        let outputs = host
            .output_devices()
            .map_err(|e| PlatformError::new(format!("failed to list output devices: {}", e)))?;

        let mut entries = Vec::new();
        collect_names(inputs, DeviceType::Input, &mut entries);
        collect_names(outputs, DeviceType::Output, &mut entries);

        Ok(build_raw_devices(
            self.host_id.name(),
            entries,
            default_input.as_deref(),
            default_output.as_deref(),
        ))
    }

    fn backend(&self) -> &str {
        self.host_id.name()
    }
}

fn collect_names<I>(devices: I, device_type: DeviceType, entries: &mut Vec<(DeviceType, String)>)
where
    I: Iterator<Item = cpal::Device>,
{
    for device in devices {
        match device.name() {
            Ok(name) if platform::is_ignored(&name, device_type) => {
                tracing::trace!(name = %name, "Skipping virtual device");
            }
            Ok(name) => entries.push((device_type, name)),
            Err(e) => {
                // Usually a device that disappeared mid-enumeration
                tracing::debug!("Failed to read {} device name: {}", device_type, e);
            }
        }
    }
}

/// Turn `(direction, name)` pairs into raw descriptors with host-scoped ids
fn build_raw_devices(
    host: &str,
    entries: Vec<(DeviceType, String)>,
    default_input: Option<&str>,
    default_output: Option<&str>,
) -> Vec<RawDevice> {
    let mut seen: HashMap<(DeviceType, String), usize> = HashMap::new();

    entries
        .into_iter()
        .map(|(device_type, name)| {
            let ordinal = seen.entry((device_type, name.clone())).or_insert(0);
            *ordinal += 1;

            let id = if *ordinal == 1 {
                format!("{}:{}:{}", host, device_type, name)
            } else {
                format!("{}:{}:{}#{}", host, device_type, name, ordinal)
            };

            let default_name = match device_type {
                DeviceType::Input => default_input,
                DeviceType::Output => default_output,
            };
            // Only the first of several same-named devices can be the default
            let is_default = *ordinal == 1 && default_name == Some(name.as_str());

            RawDevice::new(name, device_type)
                .with_id(id)
                .with_default(is_default)
        })
        .collect()
}

/// List all audio devices on the default host
///
/// # Errors
///
/// Returns [`DetectError::Enumeration`] if the host fails to enumerate.
pub fn list_devices() -> Result<Vec<AudioDevice>, DetectError> {
    Snapshotter::new(CpalEnumerator::default_host()).snapshot()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(device_type: DeviceType, name: &str) -> (DeviceType, String) {
        (device_type, name.to_string())
    }

    #[test]
    fn test_ids_are_scoped_by_host_and_direction() {
        let devices = build_raw_devices(
            "CoreAudio",
            vec![
                entry(DeviceType::Input, "MacBook Pro Microphone"),
                entry(DeviceType::Output, "MacBook Pro Speakers"),
            ],
            None,
            None,
        );
        assert_eq!(
            devices[0].id.as_deref(),
            Some("CoreAudio:input:MacBook Pro Microphone")
        );
        assert_eq!(
            devices[1].id.as_deref(),
            Some("CoreAudio:output:MacBook Pro Speakers")
        );
    }

    #[test]
    fn test_same_name_in_both_directions_is_distinct() {
        let devices = build_raw_devices(
            "WASAPI",
            vec![
                entry(DeviceType::Input, "USB Headset"),
                entry(DeviceType::Output, "USB Headset"),
            ],
            Some("USB Headset"),
            None,
        );
        assert_ne!(devices[0].id, devices[1].id);
        assert!(devices[0].is_default);
        assert!(!devices[1].is_default);
    }

    #[test]
    fn test_duplicate_names_get_ordinals() {
        let devices = build_raw_devices(
            "ALSA",
            vec![
                entry(DeviceType::Input, "USB Audio"),
                entry(DeviceType::Input, "USB Audio"),
                entry(DeviceType::Input, "USB Audio"),
            ],
            Some("USB Audio"),
            None,
        );
        let ids: Vec<_> = devices.iter().filter_map(|d| d.id.as_deref()).collect();
        assert_eq!(
            ids,
            vec!["ALSA:input:USB Audio", "ALSA:input:USB Audio#2", "ALSA:input:USB Audio#3"]
        );
        assert_eq!(devices.iter().filter(|d| d.is_default).count(), 1);
    }

    #[test]
    fn test_raw_devices_normalize_cleanly() {
        let devices = build_raw_devices(
            "CoreAudio",
            vec![entry(DeviceType::Output, "External Headphones")],
            None,
            Some("External Headphones"),
        );
        let normalized = audio_detect_core::normalize(devices).unwrap();
        assert_eq!(normalized[0].name, "External Headphones");
        assert_eq!(normalized[0].device_type, DeviceType::Output);
        assert!(normalized[0].is_default);
    }
}
