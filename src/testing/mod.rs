//! Testing utilities for pitchcam
//!
//! Provides synthetic format tables modelled on a current phone's back
//! camera modules, so selection and session logic can be exercised without
//! hardware.

pub mod fixtures;

pub use fixtures::{scenario_catalog, ultrawide_formats, wide_formats};
