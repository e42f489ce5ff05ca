//! Axis code → calibrated field dispatch
//!
//! Each raw axis code the compass daemon emits belongs to exactly one logical
//! sensor and writes exactly one field of its pending event.

use crate::config::Calibration;
use crate::sensor::{LogicalSensorId, SensorEvent, SensorPayload};

pub const CODE_ACCEL_X: u16 = 0x00; // ABS_X
pub const CODE_ACCEL_Y: u16 = 0x01; // ABS_Y
pub const CODE_ACCEL_Z: u16 = 0x02; // ABS_Z
pub const CODE_YAW: u16 = 0x03; // ABS_RX
pub const CODE_PITCH: u16 = 0x04; // ABS_RY
pub const CODE_ROLL: u16 = 0x05; // ABS_RZ
pub const CODE_ORIENT_STATUS: u16 = 0x08; // ABS_WHEEL
pub const CODE_MAGV_Z: u16 = 0x0a; // ABS_BRAKE
pub const CODE_MAGV_X: u16 = 0x10; // ABS_HAT0X
pub const CODE_MAGV_Y: u16 = 0x11; // ABS_HAT0Y

/// Bits of the orientation status the daemon fills in
pub const SENSOR_STATE_MASK: i32 = 0x7fff;
/// Raw status the daemon reports while the magnetometer is uncalibrated
pub const STATUS_NO_CONTACT_RAW: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    X,
    Y,
    Z,
    Azimuth,
    Pitch,
    Roll,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Scale(f32),
    /// Device roll axis points the other way
    NegatedScale(f32),
    /// Masked accuracy status, sentinel mapped to 0
    Status,
}

impl Transform {
    pub fn apply(self, raw: i32) -> f32 {
        match self {
            Transform::Scale(factor) => raw as f32 * factor,
            Transform::NegatedScale(factor) => -(raw as f32 * factor),
            Transform::Status => status_from_raw(raw) as f32,
        }
    }
}

pub fn status_from_raw(raw: i32) -> i8 {
    let status = (raw & SENSOR_STATE_MASK) as u8;
    if status == STATUS_NO_CONTACT_RAW {
        0
    } else {
        status as i8
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationRule {
    pub code: u16,
    pub sensor: LogicalSensorId,
    pub field: Field,
    pub transform: Transform,
}

impl CalibrationRule {
    /// Writes the transformed `raw` value into `event`
    pub fn write(&self, event: &mut SensorEvent, raw: i32) -> f32 {
        let value = self.transform.apply(raw);
        match (&mut event.payload, self.field) {
            (SensorPayload::Acceleration(v) | SensorPayload::Magnetic(v), Field::X) => v.x = value,
            (SensorPayload::Acceleration(v) | SensorPayload::Magnetic(v), Field::Y) => v.y = value,
            (SensorPayload::Acceleration(v) | SensorPayload::Magnetic(v), Field::Z) => v.z = value,
            (SensorPayload::Orientation(o), Field::Azimuth) => o.azimuth = value,
            (SensorPayload::Orientation(o), Field::Pitch) => o.pitch = value,
            (SensorPayload::Orientation(o), Field::Roll) => o.roll = value,
            (SensorPayload::Orientation(o), Field::Status) => o.status = status_from_raw(raw),
            (payload, field) => {
                tracing::error!(
                    "Calibration rule for code {:#x} targets {:?} on {:?}",
                    self.code,
                    field,
                    payload
                );
            }
        }
        value
    }
}

/// The ten axis rules, built from the configured scale factors
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTable {
    rules: [CalibrationRule; 10],
}

impl CalibrationTable {
    pub fn new(calibration: &Calibration) -> Self {
        use Field::*;
        use LogicalSensorId::*;

        let [ax, ay, az] = calibration.accel;
        let [mx, my, mz] = calibration.magnetic;
        let [oa, op, or] = calibration.orientation;
        let rule = |code, sensor, field, transform| CalibrationRule {
            code,
            sensor,
            field,
            transform,
        };

        Self {
            rules: [
                rule(CODE_ACCEL_X, Accelerometer, X, Transform::Scale(ax)),
                rule(CODE_ACCEL_Y, Accelerometer, Y, Transform::Scale(ay)),
                rule(CODE_ACCEL_Z, Accelerometer, Z, Transform::Scale(az)),
                rule(CODE_MAGV_X, MagneticField, X, Transform::Scale(mx)),
                rule(CODE_MAGV_Y, MagneticField, Y, Transform::Scale(my)),
                rule(CODE_MAGV_Z, MagneticField, Z, Transform::Scale(mz)),
                rule(CODE_YAW, Orientation, Azimuth, Transform::Scale(oa)),
                rule(CODE_PITCH, Orientation, Pitch, Transform::Scale(op)),
                rule(CODE_ROLL, Orientation, Roll, Transform::NegatedScale(or)),
                rule(CODE_ORIENT_STATUS, Orientation, Status, Transform::Status),
            ],
        }
    }

    pub fn lookup(&self, code: u16) -> Option<&CalibrationRule> {
        self.rules.iter().find(|rule| rule.code == code)
    }

    /// Rules feeding one logical sensor
    pub fn rules_for(&self, sensor: LogicalSensorId) -> impl Iterator<Item = &CalibrationRule> {
        self.rules.iter().filter(move |rule| rule.sensor == sensor)
    }
}

impl Default for CalibrationTable {
    fn default() -> Self {
        Self::new(&Calibration::default())
    }
}
