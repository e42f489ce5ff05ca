//! Sensor hub: reassembly, enable-state and sampling period negotiation
//!
//! ```text
//! InputEventSource ──► EventMultiplexer ──► batch ──► SensorHub::poll_events
//!                            │ gated by
//!                            ▼
//! set_enabled / set_delay ──► SensorStateController ──► VendorBackend
//!                            └──► DelayNegotiator ──► DelayControl
//! ```
//!
//! 1. [`calibration`] - axis code to field dispatch table
//! 2. [`multiplexer`] - per-sensor buffering and flush on sync
//! 3. [`state`] - enabled mask and accelerometer reference count
//! 4. [`delay`] - sampling period negotiation
//! 5. [`one_shot`] - significant-motion lifecycle
//! 6. [`sensor_hub`] - control surface

pub mod calibration;
pub mod delay;
pub mod multiplexer;
pub mod one_shot;
pub mod sensor_hub;
pub mod state;

pub use calibration::CalibrationTable;
pub use delay::DelayNegotiator;
pub use multiplexer::EventMultiplexer;
pub use sensor_hub::SensorHub;
pub use state::SensorStateController;
