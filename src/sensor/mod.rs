//! Sensor model shared by the multiplexer, the state controller and the hub
//!
//! Four logical sensors are served from three physical kinds:
//!
//! ```text
//! Accelerometer ─────┐
//!                    ├──► PhysicalKind::Accelerometer (reference counted)
//! SignificantMotion ─┘
//! MagneticField ─────────► PhysicalKind::MagneticField
//! Orientation ───────────► PhysicalKind::Orientation
//! ```

pub mod error;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use error::SensorError;

/// External handle of the accelerometer
pub const HANDLE_ACCELEROMETER: i32 = 0;
/// External handle of the magnetometer
pub const HANDLE_MAGNETIC_FIELD: i32 = 1;
/// External handle of the orientation sensor
pub const HANDLE_ORIENTATION: i32 = 2;
/// External handle of the significant-motion one-shot sensor
pub const HANDLE_SIGNIFICANT_MOTION: i32 = 3;

/// Accuracy reported until the device says otherwise
pub const STATUS_ACCURACY_HIGH: i8 = 3;

/// Logical sensor identities. The discriminant is the bit index used in
/// every [`SensorMask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalSensorId {
    Accelerometer = 0,
    MagneticField = 1,
    Orientation = 2,
    SignificantMotion = 3,
}

impl LogicalSensorId {
    /// All sensors in flush order
    pub const ALL: [LogicalSensorId; 4] = [
        LogicalSensorId::Accelerometer,
        LogicalSensorId::MagneticField,
        LogicalSensorId::Orientation,
        LogicalSensorId::SignificantMotion,
    ];

    pub fn from_handle(handle: i32) -> Option<Self> {
        match handle {
            HANDLE_ACCELEROMETER => Some(LogicalSensorId::Accelerometer),
            HANDLE_MAGNETIC_FIELD => Some(LogicalSensorId::MagneticField),
            HANDLE_ORIENTATION => Some(LogicalSensorId::Orientation),
            HANDLE_SIGNIFICANT_MOTION => Some(LogicalSensorId::SignificantMotion),
            _ => None,
        }
    }

    pub fn handle(self) -> i32 {
        match self {
            LogicalSensorId::Accelerometer => HANDLE_ACCELEROMETER,
            LogicalSensorId::MagneticField => HANDLE_MAGNETIC_FIELD,
            LogicalSensorId::Orientation => HANDLE_ORIENTATION,
            LogicalSensorId::SignificantMotion => HANDLE_SIGNIFICANT_MOTION,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn bit(self) -> SensorMask {
        SensorMask::from_bits_retain(1 << self.index())
    }

    /// Physical hardware this logical sensor keeps alive
    pub fn physical_kind(self) -> PhysicalKind {
        match self {
            LogicalSensorId::Accelerometer | LogicalSensorId::SignificantMotion => {
                PhysicalKind::Accelerometer
            }
            LogicalSensorId::MagneticField => PhysicalKind::MagneticField,
            LogicalSensorId::Orientation => PhysicalKind::Orientation,
        }
    }

    pub fn kind(self) -> SensorKind {
        match self {
            LogicalSensorId::Accelerometer => SensorKind::Accelerometer,
            LogicalSensorId::MagneticField => SensorKind::MagneticField,
            LogicalSensorId::Orientation => SensorKind::Orientation,
            LogicalSensorId::SignificantMotion => SensorKind::SignificantMotion,
        }
    }
}

impl Display for LogicalSensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalSensorId::Accelerometer => write!(f, "accelerometer"),
            LogicalSensorId::MagneticField => write!(f, "magnetic-field"),
            LogicalSensorId::Orientation => write!(f, "orientation"),
            LogicalSensorId::SignificantMotion => write!(f, "significant-motion"),
        }
    }
}

/// Hardware capabilities exposed by the vendor backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalKind {
    Accelerometer,
    MagneticField,
    Orientation,
    /// Present on the chip but never served; disabled at startup
    Temperature,
}

impl PhysicalKind {
    /// Sensor type code understood by the vendor library
    pub fn type_code(self) -> u32 {
        match self {
            PhysicalKind::Accelerometer => 1,
            PhysicalKind::MagneticField => 2,
            PhysicalKind::Orientation => 3,
            PhysicalKind::Temperature => 7,
        }
    }

    /// Logical sensor whose enabled bit mirrors this kind at startup
    pub fn primary_sensor(self) -> Option<LogicalSensorId> {
        match self {
            PhysicalKind::Accelerometer => Some(LogicalSensorId::Accelerometer),
            PhysicalKind::MagneticField => Some(LogicalSensorId::MagneticField),
            PhysicalKind::Orientation => Some(LogicalSensorId::Orientation),
            PhysicalKind::Temperature => None,
        }
    }
}

impl Display for PhysicalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalKind::Accelerometer => write!(f, "accelerometer"),
            PhysicalKind::MagneticField => write!(f, "magnetometer"),
            PhysicalKind::Orientation => write!(f, "orientation"),
            PhysicalKind::Temperature => write!(f, "temperature"),
        }
    }
}

/// Kind tag carried by every emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Accelerometer,
    MagneticField,
    Orientation,
    SignificantMotion,
}

impl SensorKind {
    pub fn type_code(self) -> i32 {
        match self {
            SensorKind::Accelerometer => 1,
            SensorKind::MagneticField => 2,
            SensorKind::Orientation => 3,
            SensorKind::SignificantMotion => 17,
        }
    }
}

bitflags! {
    /// Bitset over [`LogicalSensorId`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SensorMask: u32 {
        const ACCELEROMETER = 1 << 0;
        const MAGNETIC_FIELD = 1 << 1;
        const ORIENTATION = 1 << 2;
        const SIGNIFICANT_MOTION = 1 << 3;
    }
}

impl SensorMask {
    pub fn has(self, id: LogicalSensorId) -> bool {
        self.contains(id.bit())
    }

    /// Set members in flush order
    pub fn sensors(self) -> impl Iterator<Item = LogicalSensorId> {
        LogicalSensorId::ALL
            .into_iter()
            .filter(move |id| self.has(*id))
    }
}

// 3-axis reading plus accuracy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub status: i8,
}

// Orientation angles in degrees plus accuracy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OrientationReading {
    pub azimuth: f32,
    pub pitch: f32,
    pub roll: f32,
    pub status: i8,
}

/// Payload discriminated by sensor kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorPayload {
    Acceleration(Vector3),
    Magnetic(Vector3),
    Orientation(OrientationReading),
    /// `data[0]` is 1.0 once motion has been detected
    Motion { data: [f32; 1] },
}

/// A calibrated, timestamped reading of one logical sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub sensor: LogicalSensorId,
    pub kind: SensorKind,
    /// Nanoseconds, taken from the synchronization record that flushed it
    pub timestamp: i64,
    pub payload: SensorPayload,
}

impl SensorEvent {
    /// Zeroed event in the shape the sensor reports
    pub fn blank(sensor: LogicalSensorId) -> Self {
        let high = Vector3 {
            status: STATUS_ACCURACY_HIGH,
            ..Default::default()
        };
        let payload = match sensor {
            LogicalSensorId::Accelerometer => SensorPayload::Acceleration(high),
            LogicalSensorId::MagneticField => SensorPayload::Magnetic(high),
            LogicalSensorId::Orientation => SensorPayload::Orientation(OrientationReading {
                status: STATUS_ACCURACY_HIGH,
                ..Default::default()
            }),
            LogicalSensorId::SignificantMotion => SensorPayload::Motion { data: [0.0] },
        };

        Self {
            sensor,
            kind: sensor.kind(),
            timestamp: 0,
            payload,
        }
    }
}
