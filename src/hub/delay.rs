//! Sampling period negotiation
//!
//! All logical sensors share one hardware clock, so the device runs at the
//! fastest period any enabled sensor asked for.

use crate::device::{DelayControl, SamplingPeriod};
use crate::sensor::{LogicalSensorId, PhysicalKind, SensorError, SensorMask};
use tracing::{debug, error, info};

pub struct DelayNegotiator {
    // Requested period per logical sensor, ns
    requested: [i64; 4],
    control: Box<dyn DelayControl>,
    current: Option<SamplingPeriod>,
}

impl DelayNegotiator {
    pub fn new(initial_ns: i64, control: Box<dyn DelayControl>) -> Self {
        Self {
            requested: [initial_ns.max(0); 4],
            control,
            current: None,
        }
    }

    pub fn requested(&self, sensor: LogicalSensorId) -> i64 {
        self.requested[sensor.index()]
    }

    /// Last period successfully pushed to the hardware
    pub fn current(&self) -> Option<SamplingPeriod> {
        self.current
    }

    /// Stores a validated, non-negative request
    pub fn record(&mut self, sensor: LogicalSensorId, period_ns: i64) {
        debug!("Recording {} ns sampling period for {}", period_ns, sensor);
        self.requested[sensor.index()] = period_ns;
    }

    /// Fastest period across `enabled`, ignoring the one-shot sensor
    pub fn wanted(&self, enabled: SensorMask) -> Option<u64> {
        enabled
            .sensors()
            .filter(|id| *id != LogicalSensorId::SignificantMotion)
            .map(|id| self.requested(id).max(0) as u64)
            .min()
    }

    /// Recomputes the period and pushes it with a single control call
    ///
    /// Returns the pushed period, or `None` when nothing periodic is enabled.
    pub fn negotiate(
        &mut self,
        enabled: SensorMask,
        active: &[PhysicalKind],
    ) -> Result<Option<SamplingPeriod>, SensorError> {
        if enabled.is_empty() {
            debug!("No sensor enabled, leaving hardware period alone");
            return Ok(None);
        }
        let Some(wanted) = self.wanted(enabled) else {
            debug!("Only one-shot sensors enabled, no periodic rate to set");
            return Ok(None);
        };

        let period = SamplingPeriod::from_nanos(wanted);
        match self.control.apply(period, active) {
            Ok(()) => {
                if self.current != Some(period) {
                    info!("Hardware sampling period now {} ms", period.millis);
                }
                self.current = Some(period);
                Ok(Some(period))
            }
            Err(e) => {
                error!("Failed to set sampling period to {} ms: {}", period.millis, e);
                Err(e)
            }
        }
    }
}
