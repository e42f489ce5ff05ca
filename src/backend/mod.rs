//! Vendor capability backend
//!
//! The chip vendor ships a closed library that actually powers the sensors up
//! and down. It is resolved at startup; when it cannot be found a
//! [`StubBackend`] takes its place so the rest of the crate never has to ask
//! whether the library is loaded.

pub mod akm_library;

use crate::device::{DelayControl, SamplingPeriod};
use crate::sensor::{PhysicalKind, SensorError};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, error, info};

pub use akm_library::AkmLibrary;

/// Capability surface of the vendor library
///
/// Implementations are shared by reference (`Rc<dyn VendorBackend>`) and are
/// only ever called from the thread that owns the hub.
pub trait VendorBackend {
    fn is_enabled(&self, kind: PhysicalKind) -> bool;

    fn enable(&self, kind: PhysicalKind) -> Result<(), SensorError>;

    fn disable(&self, kind: PhysicalKind) -> Result<(), SensorError>;

    fn set_delay(&self, kind: PhysicalKind, period_ns: u64) -> Result<(), SensorError>;
}

/// Stand-in used when the vendor library is missing
#[derive(Debug, Default, Clone, Copy)]
pub struct StubBackend;

impl VendorBackend for StubBackend {
    fn is_enabled(&self, _kind: PhysicalKind) -> bool {
        false
    }

    fn enable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        Err(SensorError::backend(kind, libc::ENODEV))
    }

    fn disable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        Err(SensorError::backend(kind, libc::ENODEV))
    }

    fn set_delay(&self, kind: PhysicalKind, _period_ns: u64) -> Result<(), SensorError> {
        Err(SensorError::backend(kind, libc::ENODEV))
    }
}

/// Pushes the negotiated period through the vendor library, once per
/// physical kind that is currently active
pub struct VendorDelay {
    backend: Rc<dyn VendorBackend>,
}

impl VendorDelay {
    pub fn new(backend: Rc<dyn VendorBackend>) -> Self {
        Self { backend }
    }
}

impl DelayControl for VendorDelay {
    fn apply(
        &mut self,
        period: SamplingPeriod,
        active: &[PhysicalKind],
    ) -> Result<(), SensorError> {
        for kind in active {
            debug!("Vendor sampling period for {} set to {} ns", kind, period.nanos);
            self.backend
                .set_delay(*kind, period.nanos)
                .map_err(|e| SensorError::Io(std::io::Error::from_raw_os_error(e.errno())))?;
        }
        Ok(())
    }
}

/// Loads the vendor library at `path`, falling back to [`StubBackend`]
pub fn load(path: &Path) -> Rc<dyn VendorBackend> {
    match AkmLibrary::load(path) {
        Ok(library) => {
            info!("Loaded vendor library from {}", path.display());
            Rc::new(library)
        }
        Err(e) => {
            error!("Unable to load vendor library {}: {}", path.display(), e);
            Rc::new(StubBackend)
        }
    }
}
