//! Identity instability detection
//!
//! A backend whose ids are not stable makes one physical device look like a
//! remove followed by an add. That cannot be corrected here, only reported.

use std::collections::HashMap;

use audio_detect_core::{AudioDevice, Delta, DetectError};

#[derive(Debug, Default)]
pub struct ChurnDetector {
    /// Devices removed on the previous successful tick
    last_removed: HashMap<String, AudioDevice>,
}

impl ChurnDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect one tick's delta and return every anomaly it shows.
    ///
    /// Two patterns are flagged: an id that comes back one tick after it was
    /// removed, and a remove/add pair in the same tick with the same name and
    /// type but different ids.
    pub fn inspect(&mut self, delta: &Delta) -> Vec<DetectError> {
        let mut anomalies = Vec::new();

        for added in &delta.added {
            if let Some(previous) = self.last_removed.get(&added.id) {
                anomalies.push(DetectError::IdentityInstability {
                    name: added.name.clone(),
                    previous_id: previous.id.clone(),
                    current_id: added.id.clone(),
                });
            }
        }

        for removed in &delta.removed {
            let swapped = delta.added.iter().find(|added| {
                added.id != removed.id
                    && added.name == removed.name
                    && added.device_type == removed.device_type
            });
            if let Some(added) = swapped {
                anomalies.push(DetectError::IdentityInstability {
                    name: removed.name.clone(),
                    previous_id: removed.id.clone(),
                    current_id: added.id.clone(),
                });
            }
        }

        self.last_removed = delta
            .removed
            .iter()
            .map(|device| (device.id.clone(), device.clone()))
            .collect();

        anomalies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_detect_core::DeviceType;

    fn mic(id: &str, name: &str) -> AudioDevice {
        AudioDevice::new(id, name, DeviceType::Input)
    }

    #[test]
    fn test_flap_across_consecutive_ticks() {
        let mut detector = ChurnDetector::new();
        let usb = mic("usb-1", "USB Mic");

        let removed = Delta {
            added: vec![],
            removed: vec![usb.clone()],
        };
        assert!(detector.inspect(&removed).is_empty());

        let readded = Delta {
            added: vec![usb],
            removed: vec![],
        };
        let anomalies = detector.inspect(&readded);
        assert_eq!(anomalies.len(), 1);
        assert!(matches!(
            &anomalies[0],
            DetectError::IdentityInstability { current_id, .. } if current_id == "usb-1"
        ));
    }

    #[test]
    fn test_flap_window_is_one_tick() {
        let mut detector = ChurnDetector::new();
        let usb = mic("usb-1", "USB Mic");

        detector.inspect(&Delta {
            added: vec![],
            removed: vec![usb.clone()],
        });
        detector.inspect(&Delta::default());
        let anomalies = detector.inspect(&Delta {
            added: vec![usb],
            removed: vec![],
        });
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_same_tick_id_swap() {
        let mut detector = ChurnDetector::new();
        let delta = Delta {
            added: vec![mic("id-2", "Headset")],
            removed: vec![mic("id-1", "Headset")],
        };
        let anomalies = detector.inspect(&delta);
        assert_eq!(
            anomalies,
            vec![DetectError::IdentityInstability {
                name: "Headset".to_string(),
                previous_id: "id-1".to_string(),
                current_id: "id-2".to_string(),
            }]
        );
    }

    #[test]
    fn test_unrelated_changes_are_quiet() {
        let mut detector = ChurnDetector::new();
        let delta = Delta {
            added: vec![mic("b", "Webcam Mic")],
            removed: vec![
                mic("a", "Headset"),
                AudioDevice::new("c", "Webcam Mic", DeviceType::Output),
            ],
        };
        assert!(detector.inspect(&delta).is_empty());
    }
}
