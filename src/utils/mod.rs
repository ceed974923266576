//! Utility functions and helpers
//!
//! This module contains timestamp conversions shared by storage and tests.

pub mod time;

pub use time::{from_millis, to_millis};
