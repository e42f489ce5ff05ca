//! Dynamically loaded vendor library (`libakm.so`)
//!
//! The library exports four C functions taking the vendor sensor type code.
//! Every mutating call returns 0 on success or a negated errno.

use super::VendorBackend;
use crate::sensor::{PhysicalKind, SensorError};
use libloading::{Library, Symbol};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

type IsEnabledFn = unsafe extern "C" fn(u32) -> i32;
type ToggleFn = unsafe extern "C" fn(u32) -> i32;
type SetDelayFn = unsafe extern "C" fn(u32, u64) -> i32;

pub struct AkmLibrary {
    is_enabled: IsEnabledFn,
    enable: ToggleFn,
    disable: ToggleFn,
    set_delay: SetDelayFn,
    // Keeps the function pointers above valid
    _library: Library,
}

impl AkmLibrary {
    pub fn load(path: &Path) -> Result<Self, libloading::Error> {
        // SAFETY: loading runs the library's initialisers; the vendor library
        // has none with preconditions on the caller.
        let library = unsafe { Library::new(path)? };

        // SAFETY: the signatures match the vendor header.
        let (is_enabled, enable, disable, set_delay) = unsafe {
            let is_enabled: Symbol<IsEnabledFn> = library.get(b"akm_is_sensor_enabled\0")?;
            let enable: Symbol<ToggleFn> = library.get(b"akm_enable_sensor\0")?;
            let disable: Symbol<ToggleFn> = library.get(b"akm_disable_sensor\0")?;
            let set_delay: Symbol<SetDelayFn> = library.get(b"akm_set_delay\0")?;
            (*is_enabled, *enable, *disable, *set_delay)
        };

        debug!("Resolved all vendor symbols from {}", path.display());
        Ok(Self {
            is_enabled,
            enable,
            disable,
            set_delay,
            _library: library,
        })
    }
}

fn check(kind: PhysicalKind, op: &str, ret: i32) -> Result<(), SensorError> {
    if ret < 0 {
        warn!("Vendor {} failed for {}: errno {}", op, kind, -ret);
        Err(SensorError::backend(kind, -ret))
    } else {
        Ok(())
    }
}

impl VendorBackend for AkmLibrary {
    fn is_enabled(&self, kind: PhysicalKind) -> bool {
        // SAFETY: pointer resolved from a library kept alive by `self`.
        unsafe { (self.is_enabled)(kind.type_code()) > 0 }
    }

    fn enable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        // SAFETY: as above.
        let ret = unsafe { (self.enable)(kind.type_code()) };
        check(kind, "enable", ret)
    }

    fn disable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        // SAFETY: as above.
        let ret = unsafe { (self.disable)(kind.type_code()) };
        check(kind, "disable", ret)
    }

    fn set_delay(&self, kind: PhysicalKind, period_ns: u64) -> Result<(), SensorError> {
        // SAFETY: as above.
        let ret = unsafe { (self.set_delay)(kind.type_code(), period_ns) };
        check(kind, "set_delay", ret)
    }
}

impl fmt::Debug for AkmLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AkmLibrary").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_returns_become_backend_errors() {
        assert!(check(PhysicalKind::Orientation, "enable", 0).is_ok());
        let err = check(PhysicalKind::Orientation, "enable", -libc::EBUSY).unwrap_err();
        assert_eq!(err.errno(), libc::EBUSY);
    }

    #[test]
    fn load_reports_missing_library() {
        assert!(AkmLibrary::load(Path::new("/nonexistent/libakm.so")).is_err());
    }
}
