//! Mock sampling period sink

use crate::device::{DelayControl, SamplingPeriod};
use crate::sensor::{PhysicalKind, SensorError};
use std::cell::{Cell, RefCell};
use std::io;
use std::rc::Rc;

#[derive(Debug, Default, Clone)]
pub struct MockDelayControl {
    applied: Rc<RefCell<Vec<SamplingPeriod>>>,
    fail: Rc<Cell<Option<i32>>>,
}

impl MockDelayControl {
    /// Periods successfully applied, oldest first
    pub fn applied(&self) -> Vec<SamplingPeriod> {
        self.applied.borrow().clone()
    }

    pub fn applied_millis(&self) -> Vec<i16> {
        self.applied.borrow().iter().map(|p| p.millis).collect()
    }

    pub fn fail_with(&self, errno: i32) {
        self.fail.set(Some(errno));
    }

    pub fn recover(&self) {
        self.fail.set(None);
    }
}

impl DelayControl for MockDelayControl {
    fn apply(
        &mut self,
        period: SamplingPeriod,
        _active: &[PhysicalKind],
    ) -> Result<(), SensorError> {
        if let Some(errno) = self.fail.get() {
            return Err(io::Error::from_raw_os_error(errno).into());
        }
        self.applied.borrow_mut().push(period);
        Ok(())
    }
}
