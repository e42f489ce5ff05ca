//! Mock backends and sources for testing
//!
//! Available during test builds and when the `mock` feature is enabled. Each
//! mock is cheap to clone and clones share state, so a test can hand one copy
//! to the hub and keep another to inspect what happened.

#![cfg(any(test, feature = "mock"))]

mod backend;
mod delay;
mod source;

pub use backend::{BackendCall, MockBackend};
pub use delay::MockDelayControl;
pub use source::ScriptedSource;
