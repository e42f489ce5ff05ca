//! Multiplexes the AKM compass input stream into four logical sensors
//!
//! The accelerometer, magnetometer and orientation readings arrive on one
//! kernel input node. [`hub::SensorHub`] reassembles them into per-sensor
//! events, gates them by the enabled set, and mediates enable and sampling
//! period requests towards the vendor library.

pub mod backend;
pub mod config;
pub mod device;
pub mod hub;
pub mod mock;
pub mod sensor;
