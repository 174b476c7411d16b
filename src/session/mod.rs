//! Capture session ownership: transactions, the lifecycle controller and
//! the worker thread that serializes every mutation.

mod controller;
mod state;
mod transaction;
mod worker;

pub use controller::{CaptureSessionController, ControllerSettings};
pub use state::{ActiveConfiguration, ReconfigureRequest, SessionState};
pub use transaction::ConfigurationTransaction;
pub use worker::{CameraService, CaptureCommand, PublishedState};
