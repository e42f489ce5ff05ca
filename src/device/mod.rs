//! Boundary with the kernel: raw input records in, sampling period out

pub mod evdev;

use crate::sensor::{PhysicalKind, SensorError};
use std::collections::VecDeque;

pub use evdev::{AkmControlDevice, EvdevSource};

/// `EV_SYN`: the preceding axis updates form a complete record
pub const EV_SYN: u16 = 0x00;
/// `EV_REL`: one axis update; the compass daemon publishes relative events
pub const EV_REL: u16 = 0x02;

/// One `struct input_event` as read from the node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputRecord {
    pub event_type: u16,
    pub code: u16,
    pub value: i32,
    /// Kernel event time in nanoseconds
    pub time_ns: i64,
}

impl RawInputRecord {
    pub fn axis(code: u16, value: i32, time_ns: i64) -> Self {
        Self {
            event_type: EV_REL,
            code,
            value,
            time_ns,
        }
    }

    pub fn sync(time_ns: i64) -> Self {
        Self {
            event_type: EV_SYN,
            code: 0,
            value: 0,
            time_ns,
        }
    }

    pub fn class(&self) -> EventClass {
        match self.event_type {
            EV_SYN => EventClass::Synchronization,
            EV_REL => EventClass::AxisUpdate,
            other => EventClass::Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    AxisUpdate,
    Synchronization,
    /// Anything else the node may carry; skipped
    Other(u16),
}

/// Non-blocking producer of raw input records
pub trait InputEventSource {
    /// Appends up to `max` available records to `out` and returns how many
    /// were added. Returns `Ok(0)` when nothing is pending.
    fn read_records(
        &mut self,
        out: &mut VecDeque<RawInputRecord>,
        max: usize,
    ) -> Result<usize, SensorError>;

    /// Current absolute value the device holds for an axis code, if it can
    /// be queried
    fn current_value(&self, code: u16) -> Option<i32>;
}

/// Negotiated hardware sampling period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPeriod {
    pub nanos: u64,
    /// Hardware granularity, saturated to what the control ioctl accepts
    pub millis: i16,
}

impl SamplingPeriod {
    pub fn from_nanos(nanos: u64) -> Self {
        let millis = (nanos / 1_000_000).min(i16::MAX as u64) as i16;
        Self { nanos, millis }
    }
}

/// Destination of the negotiated sampling period
pub trait DelayControl {
    /// `active` lists the physical kinds currently backing an enabled sensor
    fn apply(&mut self, period: SamplingPeriod, active: &[PhysicalKind])
        -> Result<(), SensorError>;
}
