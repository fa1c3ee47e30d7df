//! Audio device hot-plug monitoring
//!
//! [`DeviceMonitor`] keeps a live inventory of attached audio devices and
//! publishes `add` / `remove` notifications through a [`NotificationBus`].
//! [`DeviceMonitor::find`] takes an ad-hoc snapshot independently of the
//! monitor loop.

mod bus;
mod churn;
mod config;
mod monitor;
mod state;

pub use audio_detect_core::{
    AudioDevice, DetectError, DeviceEnumerator, DeviceFilter, DeviceType, PlatformError,
    RawDevice, Result,
};
pub use bus::{DeviceEvents, NotificationBus, Subscription, Topic};
pub use churn::ChurnDetector;
pub use config::{MonitorConfig, DEFAULT_ENUMERATION_TIMEOUT, DEFAULT_POLL_INTERVAL};
pub use monitor::DeviceMonitor;
pub use state::{MonitorState, MonitorStats};
