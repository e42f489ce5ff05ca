//! Enabled-state bookkeeping between callers and the vendor backend
//!
//! The physical accelerometer backs two logical sensors, the raw
//! accelerometer and significant motion. It is reference counted so that
//! toggling one never powers it down under the other:
//!
//! ```text
//! refs 0 ──enable──► 1 ──enable──► 2      backend.enable on 0 → 1 only
//! refs 2 ─disable──► 1 ─disable──► 0      backend.disable on 1 → 0 only
//! ```

use super::delay::DelayNegotiator;
use crate::backend::VendorBackend;
use crate::sensor::{LogicalSensorId, PhysicalKind, SensorError, SensorMask};
use std::rc::Rc;
use tracing::{debug, error, info, warn};

pub struct SensorStateController {
    backend: Rc<dyn VendorBackend>,
    delays: DelayNegotiator,
    enabled: SensorMask,
    accel_refs: u8,
}

impl SensorStateController {
    /// Controller with every sensor off
    pub fn new(backend: Rc<dyn VendorBackend>, delays: DelayNegotiator) -> Self {
        Self {
            backend,
            delays,
            enabled: SensorMask::empty(),
            accel_refs: 0,
        }
    }

    /// Controller whose mask mirrors what the backend already reports enabled
    pub fn from_hardware(backend: Rc<dyn VendorBackend>, delays: DelayNegotiator) -> Self {
        let mut controller = Self::new(backend, delays);

        for kind in [
            PhysicalKind::Accelerometer,
            PhysicalKind::MagneticField,
            PhysicalKind::Orientation,
        ] {
            if !controller.backend.is_enabled(kind) {
                continue;
            }
            if let Some(sensor) = kind.primary_sensor() {
                info!("{} already enabled in hardware", sensor);
                controller.enabled.insert(sensor.bit());
            }
            if kind == PhysicalKind::Accelerometer {
                controller.accel_refs = 1;
            }
        }

        // The chip's temperature channel is never served
        if let Err(e) = controller.backend.disable(PhysicalKind::Temperature) {
            warn!("Could not disable temperature sensor: {}", e);
        }

        controller
    }

    pub fn enabled_mask(&self) -> SensorMask {
        self.enabled
    }

    pub fn is_enabled(&self, sensor: LogicalSensorId) -> bool {
        self.enabled.has(sensor)
    }

    pub fn accel_ref_count(&self) -> u8 {
        self.accel_refs
    }

    pub fn delays(&self) -> &DelayNegotiator {
        &self.delays
    }

    /// Physical kinds currently backing at least one enabled sensor
    pub fn active_kinds(&self) -> Vec<PhysicalKind> {
        let mut kinds = Vec::new();
        for kind in self.enabled.sensors().map(LogicalSensorId::physical_kind) {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }

    /// Enables or disables the sensor behind an external handle
    pub fn set_enabled(&mut self, handle: i32, enabled: bool) -> Result<(), SensorError> {
        let sensor = LogicalSensorId::from_handle(handle).ok_or_else(|| {
            SensorError::InvalidArgument(format!("unknown sensor handle {}", handle))
        })?;
        self.set_sensor_enabled(sensor, enabled)
    }

    pub fn set_sensor_enabled(
        &mut self,
        sensor: LogicalSensorId,
        enabled: bool,
    ) -> Result<(), SensorError> {
        if self.enabled.has(sensor) == enabled {
            debug!("{} already {}", sensor, if enabled { "enabled" } else { "disabled" });
            return Ok(());
        }

        let kind = sensor.physical_kind();
        let shared = kind == PhysicalKind::Accelerometer;

        let result = if enabled {
            if shared && self.accel_refs > 0 {
                debug!("Physical accelerometer already active, refs={}", self.accel_refs);
                Ok(())
            } else {
                info!("Enabling {} ({})", sensor, kind);
                self.backend.enable(kind)
            }
        } else if shared && self.accel_refs > 1 {
            debug!("Physical accelerometer still in use, refs={}", self.accel_refs);
            Ok(())
        } else {
            info!("Disabling {} ({})", sensor, kind);
            self.backend.disable(kind)
        };

        if let Err(e) = result {
            error!("Could not change {} state: {}", sensor, e);
            return Err(e);
        }

        if shared {
            if enabled {
                self.accel_refs += 1;
            } else {
                self.accel_refs = self.accel_refs.saturating_sub(1);
            }
        }
        self.enabled.set(sensor.bit(), enabled);

        let active = self.active_kinds();
        self.delays.negotiate(self.enabled, &active)?;
        Ok(())
    }

    /// Records a sampling period request for the sensor behind `handle`
    pub fn set_delay(&mut self, handle: i32, period_ns: i64) -> Result<(), SensorError> {
        if period_ns < 0 {
            return Err(SensorError::InvalidArgument(format!(
                "negative sampling period {} ns",
                period_ns
            )));
        }
        let sensor = LogicalSensorId::from_handle(handle).ok_or_else(|| {
            SensorError::InvalidArgument(format!("unknown sensor handle {}", handle))
        })?;

        if sensor == LogicalSensorId::SignificantMotion {
            debug!("Ignoring sampling period for one-shot {}", sensor);
            return Ok(());
        }

        self.delays.record(sensor, period_ns);
        let active = self.active_kinds();
        self.delays.negotiate(self.enabled, &active)?;
        Ok(())
    }
}
