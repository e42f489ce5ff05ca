//! Control surface handed to the sensor-management layer
//!
//! Owns the input source, the multiplexer and the state controller, and
//! keeps raw records that did not fit into a caller's batch for the next
//! poll.

use super::calibration::CalibrationTable;
use super::delay::DelayNegotiator;
use super::multiplexer::EventMultiplexer;
use super::state::SensorStateController;
use crate::backend::VendorBackend;
use crate::config::SensorConfig;
use crate::device::{DelayControl, InputEventSource, RawInputRecord};
use crate::sensor::{SensorError, SensorEvent, SensorMask};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub struct SensorHub {
    source: Box<dyn InputEventSource>,
    multiplexer: EventMultiplexer,
    controller: SensorStateController,
    // Raw records read but not yet fed through the multiplexer
    backlog: VecDeque<RawInputRecord>,
    // Flushed events that did not fit into the previous caller batch
    carry: VecDeque<SensorEvent>,
    // Read failure hit while carried events were being returned
    deferred_error: Option<SensorError>,
    read_capacity: usize,
}

impl SensorHub {
    /// Builds the hub and aligns its state with what the hardware already
    /// reports enabled
    pub fn new(
        config: &SensorConfig,
        source: Box<dyn InputEventSource>,
        backend: Rc<dyn VendorBackend>,
        delay_control: Box<dyn DelayControl>,
    ) -> Self {
        let delays = DelayNegotiator::new(config.delays.initial_ns, delay_control);
        let controller = SensorStateController::from_hardware(backend, delays);

        let mut multiplexer = EventMultiplexer::new(
            CalibrationTable::new(&config.calibration),
            config.motion.threshold,
        );
        multiplexer.prime(source.as_ref(), controller.enabled_mask());

        info!(
            "Sensor hub ready, enabled at startup: {:?}",
            controller.enabled_mask().sensors().collect::<Vec<_>>()
        );

        Self {
            source,
            multiplexer,
            controller,
            backlog: VecDeque::new(),
            carry: VecDeque::new(),
            deferred_error: None,
            read_capacity: config.device.read_capacity.max(1),
        }
    }

    pub fn set_enabled(&mut self, handle: i32, enabled: bool) -> Result<(), SensorError> {
        self.controller.set_enabled(handle, enabled)
    }

    pub fn set_delay(&mut self, handle: i32, period_ns: i64) -> Result<(), SensorError> {
        self.controller.set_delay(handle, period_ns)
    }

    pub fn enabled_mask(&self) -> SensorMask {
        self.controller.enabled_mask()
    }

    pub fn controller(&self) -> &SensorStateController {
        &self.controller
    }

    pub fn multiplexer(&self) -> &EventMultiplexer {
        &self.multiplexer
    }

    /// Returns up to `max_count` events, reading from the source at most once
    ///
    /// Events already flushed are never dropped: if the read fails while
    /// carried events are in hand, they are returned and the error is
    /// reported by the next call.
    pub fn poll_events(&mut self, max_count: usize) -> Result<Vec<SensorEvent>, SensorError> {
        if max_count == 0 {
            return Err(SensorError::InvalidArgument(
                "poll requested zero events".to_string(),
            ));
        }
        if let Some(e) = self.deferred_error.take() {
            return Err(e);
        }

        let mut events = Vec::with_capacity(max_count);
        while events.len() < max_count {
            match self.carry.pop_front() {
                Some(event) => events.push(event),
                None => break,
            }
        }
        if events.len() == max_count {
            return Ok(events);
        }

        let room = self.read_capacity.saturating_sub(self.backlog.len());
        if room > 0 {
            if let Err(e) = self.source.read_records(&mut self.backlog, room) {
                if events.is_empty() {
                    return Err(e);
                }
                warn!(
                    "Read failed with {} carried events in hand, reporting it next poll: {}",
                    events.len(),
                    e
                );
                self.deferred_error = Some(e);
            }
        }

        while events.len() < max_count {
            let Some(record) = self.backlog.pop_front() else {
                break;
            };
            if let Some(batch) = self
                .multiplexer
                .process_raw_event(&record, &mut self.controller)
            {
                for event in batch {
                    if events.len() < max_count {
                        events.push(event);
                    } else {
                        self.carry.push_back(event);
                    }
                }
            }
        }

        if !self.backlog.is_empty() || !self.carry.is_empty() {
            debug!(
                "Poll filled, {} records and {} events held back",
                self.backlog.len(),
                self.carry.len()
            );
        }
        Ok(events)
    }
}
