//! cpal-backed device enumeration
//!
//! Provides [`CpalEnumerator`], the [`DeviceEnumerator`] used on real hosts:
//! CoreAudio on macOS, WASAPI on Windows and ALSA on Linux.

mod device;
mod platform;

pub use audio_detect_core::{AudioDevice, DetectError, DeviceEnumerator, DeviceType, RawDevice};
pub use device::{list_devices, CpalEnumerator};
