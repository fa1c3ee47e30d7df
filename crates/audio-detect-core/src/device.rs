use std::fmt;

use serde::{Deserialize, Serialize};

/// Direction of an audio endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Input,
    Output,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A canonical audio endpoint record.
///
/// `id` is the only field used for identity. Everything else is descriptive
/// metadata that may change between enumerations without the device itself
/// being considered added or removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub is_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type,
            is_default: false,
            manufacturer: None,
            vendor_id: None,
            product_id: None,
            serial_number: None,
        }
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

impl fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({})", self.name, self.device_type, self.id)
    }
}

/// Unvalidated descriptor as reported by the platform enumeration primitive.
///
/// The snapshotter is the only place that turns these into [`AudioDevice`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDevice {
    pub id: Option<String>,
    pub name: String,
    pub device_type: Option<DeviceType>,
    pub is_default: bool,
    pub manufacturer: Option<String>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
}

impl RawDevice {
    pub fn new(name: impl Into<String>, device_type: DeviceType) -> Self {
        Self {
            name: name.into(),
            device_type: Some(device_type),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }
}

/// Narrows a device list by type and USB vendor/product ids.
///
/// Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceFilter {
    pub device_type: Option<DeviceType>,
    pub vendor_id: Option<u16>,
    pub product_id: Option<u16>,
}

impl DeviceFilter {
    pub fn device_type(device_type: DeviceType) -> Self {
        Self {
            device_type: Some(device_type),
            ..Default::default()
        }
    }

    pub fn usb(vendor_id: u16, product_id: Option<u16>) -> Self {
        Self {
            vendor_id: Some(vendor_id),
            product_id,
            ..Default::default()
        }
    }

    pub fn matches(&self, device: &AudioDevice) -> bool {
        self.device_type.map_or(true, |t| t == device.device_type)
            && self.vendor_id.map_or(true, |v| Some(v) == device.vendor_id)
            && self.product_id.map_or(true, |p| Some(p) == device.product_id)
    }

    pub fn apply(&self, devices: Vec<AudioDevice>) -> Vec<AudioDevice> {
        devices.into_iter().filter(|d| self.matches(d)).collect()
    }
}
