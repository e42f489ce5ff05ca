//! Mock vendor backend

use crate::backend::VendorBackend;
use crate::sensor::{PhysicalKind, SensorError};
use std::cell::{Cell, RefCell};

/// Backend call kind for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Enable(PhysicalKind),
    Disable(PhysicalKind),
    SetDelay(PhysicalKind, u64),
}

/// Records every call and tracks which kinds are powered
#[derive(Debug, Default)]
pub struct MockBackend {
    calls: RefCell<Vec<BackendCall>>,
    enabled: RefCell<Vec<PhysicalKind>>,
    fail: Cell<Option<i32>>,
}

impl MockBackend {
    /// Backend that reports `kinds` as already enabled
    pub fn with_enabled(kinds: &[PhysicalKind]) -> Self {
        let backend = Self::default();
        backend.enabled.borrow_mut().extend_from_slice(kinds);
        backend
    }

    /// Get call log (for test verification)
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.borrow().clone()
    }

    pub fn enable_calls(&self, kind: PhysicalKind) -> usize {
        self.count(BackendCall::Enable(kind))
    }

    pub fn disable_calls(&self, kind: PhysicalKind) -> usize {
        self.count(BackendCall::Disable(kind))
    }

    /// Make every following call fail with `errno`
    pub fn fail_with(&self, errno: i32) {
        self.fail.set(Some(errno));
    }

    pub fn recover(&self) {
        self.fail.set(None);
    }

    fn count(&self, call: BackendCall) -> usize {
        self.calls.borrow().iter().filter(|c| **c == call).count()
    }

    fn record(&self, call: BackendCall, kind: PhysicalKind) -> Result<(), SensorError> {
        self.calls.borrow_mut().push(call);
        match self.fail.get() {
            Some(errno) => Err(SensorError::backend(kind, errno)),
            None => Ok(()),
        }
    }
}

impl VendorBackend for MockBackend {
    fn is_enabled(&self, kind: PhysicalKind) -> bool {
        self.enabled.borrow().contains(&kind)
    }

    fn enable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        self.record(BackendCall::Enable(kind), kind)?;
        let mut enabled = self.enabled.borrow_mut();
        if !enabled.contains(&kind) {
            enabled.push(kind);
        }
        Ok(())
    }

    fn disable(&self, kind: PhysicalKind) -> Result<(), SensorError> {
        self.record(BackendCall::Disable(kind), kind)?;
        self.enabled.borrow_mut().retain(|k| *k != kind);
        Ok(())
    }

    fn set_delay(&self, kind: PhysicalKind, period_ns: u64) -> Result<(), SensorError> {
        self.record(BackendCall::SetDelay(kind, period_ns), kind)
    }
}
