//! Error definitions for the sensor control surface

use super::PhysicalKind;
use thiserror::Error;

/// Errors returned by `set_enabled`, `set_delay` and `poll_events`
///
/// Each variant maps onto a POSIX error code through [`SensorError::errno`],
/// which is what HAL-style callers hand back to their own clients.
#[derive(Debug, Error)]
pub enum SensorError {
    /// Unknown handle, negative delay or zero-capacity read request
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The vendor backend refused a state change (or is the stub)
    #[error("Device unavailable: {kind} ({source})")]
    DeviceUnavailable {
        kind: PhysicalKind,
        #[source]
        source: std::io::Error,
    },

    /// Reading the input node or issuing an ioctl failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SensorError {
    /// Builds a backend failure from the (positive) errno it reported
    pub fn backend(kind: PhysicalKind, errno: i32) -> Self {
        SensorError::DeviceUnavailable {
            kind,
            source: std::io::Error::from_raw_os_error(errno),
        }
    }

    /// POSIX code for this error
    pub fn errno(&self) -> i32 {
        match self {
            SensorError::InvalidArgument(_) => libc::EINVAL,
            SensorError::DeviceUnavailable { source, .. } => {
                source.raw_os_error().unwrap_or(libc::ENODEV)
            }
            SensorError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mirrors_posix_codes() {
        assert_eq!(
            SensorError::InvalidArgument("bad handle".into()).errno(),
            libc::EINVAL
        );
        assert_eq!(
            SensorError::backend(PhysicalKind::Accelerometer, libc::ENODEV).errno(),
            libc::ENODEV
        );
        let io = std::io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(SensorError::from(io).errno(), libc::EBADF);
        let custom = std::io::Error::new(std::io::ErrorKind::Other, "short read");
        assert_eq!(SensorError::from(custom).errno(), libc::EIO);
    }
}
