//! One-shot sensor lifecycle with statum
//!
//! A one-shot sensor produces a single event and must then be switched off
//! until the caller re-enables it.
//!
//! ```text
//! Armed ──fire(event)──► Firing(event) ──disarm()──► Disarmed
//! ```

use super::state::SensorStateController;
use crate::sensor::{LogicalSensorId, SensorError, SensorEvent};
use statum::{machine, state};
use tracing::{debug, info, warn};

#[state]
#[derive(Debug, Clone)]
pub enum OneShotState {
    Armed,
    Firing(SensorEvent),
    Disarmed,
}

#[machine]
#[derive(Debug)]
pub struct OneShot<S: OneShotState> {
    sensor: LogicalSensorId,
}

impl<S: OneShotState> OneShot<S> {
    pub fn sensor(&self) -> LogicalSensorId {
        self.sensor
    }
}

impl OneShot<Armed> {
    pub fn arm(sensor: LogicalSensorId) -> Self {
        debug!("Arming one-shot sensor {}", sensor);
        Self::new(sensor)
    }

    /// Records the single event this sensor is allowed to produce
    pub fn fire(self, event: SensorEvent) -> OneShot<Firing> {
        info!("One-shot sensor {} fired at {}", self.sensor, event.timestamp);
        self.transition_with(event)
    }
}

impl OneShot<Firing> {
    pub fn event(&self) -> Option<&SensorEvent> {
        self.get_state_data()
    }

    /// Issues the disable request for the sensor that fired
    ///
    /// When the backend refuses, the sensor stays enabled in the controller
    /// and the error is handed back together with the still-firing machine.
    /// A failure to push the new sampling period afterwards does not undo
    /// the disable, so the machine still ends up disarmed.
    pub fn disarm(
        self,
        controller: &mut SensorStateController,
    ) -> Result<OneShot<Disarmed>, (Self, SensorError)> {
        match controller.set_sensor_enabled(self.sensor, false) {
            Ok(()) => {
                info!("One-shot sensor {} automatically disabled", self.sensor);
                Ok(self.transition())
            }
            Err(e) if !controller.is_enabled(self.sensor) => {
                warn!(
                    "One-shot sensor {} disabled, but the sampling period update failed: {}",
                    self.sensor, e
                );
                Ok(self.transition())
            }
            Err(e) => Err((self, e)),
        }
    }
}
