//! Core types for audio device detection
//!
//! - [`AudioDevice`] / [`RawDevice`]: canonical and platform-reported records
//! - [`DeviceEnumerator`]: the boundary to the platform enumeration primitive
//! - [`Snapshotter`]: turns one enumeration into normalized devices
//! - [`diff`]: added/removed delta between two enumerations

mod device;
mod diff;
mod error;
mod snapshot;
mod traits;

pub use device::{AudioDevice, DeviceFilter, DeviceType, RawDevice};
pub use diff::{diff, Delta, DeviceSet};
pub use error::{DetectError, PlatformError, Result};
pub use snapshot::{normalize, Snapshotter};
pub use traits::DeviceEnumerator;
