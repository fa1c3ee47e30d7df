use crate::device::RawDevice;
use crate::error::PlatformError;

/// Trait for platform device enumeration primitives (cpal hosts, test fakes)
///
/// Implementations may block on a system call. They must not cache or retry;
/// each call reflects the devices attached right now.
pub trait DeviceEnumerator: Send + Sync + 'static {
    /// Return every currently attached audio endpoint
    fn enumerate(&self) -> Result<Vec<RawDevice>, PlatformError>;

    /// Short backend name used in log output
    fn backend(&self) -> &str {
        "custom"
    }
}

impl<F> DeviceEnumerator for F
where
    F: Fn() -> Result<Vec<RawDevice>, PlatformError> + Send + Sync + 'static,
{
    fn enumerate(&self) -> Result<Vec<RawDevice>, PlatformError> {
        self()
    }
}
