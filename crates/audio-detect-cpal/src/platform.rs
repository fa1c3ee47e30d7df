//! Per-platform filtering of devices that are not real endpoints

use audio_detect_core::DeviceType;

/// Whether a device reported by the host should be left out of snapshots
pub fn is_ignored(name: &str, device_type: DeviceType) -> bool {
    ignored_on_platform(name, device_type)
}

/// Skip macOS process-tap aggregate devices
#[cfg(target_os = "macos")]
fn ignored_on_platform(name: &str, device_type: DeviceType) -> bool {
    device_type == DeviceType::Input && name.contains("TAP")
}

/// Skip the ALSA `null` sink/source, which is always present
#[cfg(target_os = "linux")]
fn ignored_on_platform(name: &str, _device_type: DeviceType) -> bool {
    name == "null"
}

#[cfg(not(any(target_os = "macos", target_os = "linux")))]
fn ignored_on_platform(_name: &str, _device_type: DeviceType) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_devices_are_kept() {
        assert!(!is_ignored("Built-in Microphone", DeviceType::Input));
        assert!(!is_ignored("Speakers", DeviceType::Output));
    }

    #[cfg(target_os = "macos")]
    #[test]
    fn test_tap_devices_are_skipped_on_macos() {
        assert!(is_ignored("Audio TAP Aggregate", DeviceType::Input));
        assert!(!is_ignored("Audio TAP Aggregate", DeviceType::Output));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_null_device_is_skipped_on_linux() {
        assert!(is_ignored("null", DeviceType::Output));
        assert!(!is_ignored("nullable", DeviceType::Output));
    }
}
