//! Monitor lifecycle state and counters

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle of a [`DeviceMonitor`](crate::DeviceMonitor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Stopped,
    Running,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Point-in-time copy of the monitor counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStats {
    /// Enumeration ticks started, including failed ones
    pub ticks: u64,
    pub failed_ticks: u64,
    pub devices_added: u64,
    pub devices_removed: u64,
    pub identity_anomalies: u64,
}

/// Lock-free counters updated by the monitor loop
#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    ticks: AtomicU64,
    failed_ticks: AtomicU64,
    devices_added: AtomicU64,
    devices_removed: AtomicU64,
    identity_anomalies: AtomicU64,
}

impl StatsCounters {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_failure(&self) {
        self.failed_ticks.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_delta(&self, added: usize, removed: usize) {
        self.devices_added.fetch_add(added as u64, Ordering::SeqCst);
        self.devices_removed.fetch_add(removed as u64, Ordering::SeqCst);
    }

    pub fn record_anomalies(&self, count: usize) {
        self.identity_anomalies.fetch_add(count as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> MonitorStats {
        MonitorStats {
            ticks: self.ticks.load(Ordering::SeqCst),
            failed_ticks: self.failed_ticks.load(Ordering::SeqCst),
            devices_added: self.devices_added.load(Ordering::SeqCst),
            devices_removed: self.devices_removed.load(Ordering::SeqCst),
            identity_anomalies: self.identity_anomalies.load(Ordering::SeqCst),
        }
    }
}
