//! Monitor configuration

use std::time::Duration;

use audio_detect_core::{DetectError, Result};
use serde::{Deserialize, Serialize};

/// Default delay between two enumeration ticks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Default upper bound for a single enumeration call
pub const DEFAULT_ENUMERATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Monitor loop configuration
///
/// Durations are (de)serialized as whole milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    #[serde(with = "millis")]
    pub poll_interval: Duration,
    #[serde(with = "millis")]
    pub enumeration_timeout: Duration,
    /// Emit `add` for devices already present on the first tick
    pub announce_initial_devices: bool,
    /// Report ids that churn between ticks as identity instability
    pub churn_detection: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            enumeration_timeout: DEFAULT_ENUMERATION_TIMEOUT,
            announce_initial_devices: false,
            churn_detection: true,
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_enumeration_timeout(mut self, timeout: Duration) -> Self {
        self.enumeration_timeout = timeout;
        self
    }

    pub fn with_announce_initial_devices(mut self, announce: bool) -> Self {
        self.announce_initial_devices = announce;
        self
    }

    /// # Errors
    ///
    /// Returns [`DetectError::InvalidConfig`] for a zero poll interval or
    /// enumeration timeout.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(DetectError::InvalidConfig(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.enumeration_timeout.is_zero() {
            return Err(DetectError::InvalidConfig(
                "enumeration timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitorConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.announce_initial_devices);
        assert!(config.churn_detection);
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        let config = MonitorConfig::default().with_poll_interval(Duration::ZERO);
        assert!(matches!(config.validate(), Err(DetectError::InvalidConfig(_))));

        let config = MonitorConfig::default().with_enumeration_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(DetectError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{ "pollInterval": 250, "announceInitialDevices": true }"#)
                .unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.enumeration_timeout, DEFAULT_ENUMERATION_TIMEOUT);
        assert!(config.announce_initial_devices);
    }

    #[test]
    fn test_serializes_durations_as_millis() {
        let json = serde_json::to_value(MonitorConfig::default()).unwrap();
        assert_eq!(json["pollInterval"], 1000);
        assert_eq!(json["enumerationTimeout"], 5000);
    }
}
