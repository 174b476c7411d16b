//! Recording lifecycle and metadata persistence
//!
//! The movie bytes are written by the hardware backend. This module decides
//! where they go, captures the configuration in effect when a recording
//! starts, and hands the finished (movie, metadata) pair to a
//! [`RecordingStore`].
//!
//! # Example
//! ```rust,ignore
//! use pitchcam::recording::RecordingSessionCoordinator;
//!
//! let mut coordinator = RecordingSessionCoordinator::from_config(&config.recording);
//! let (tx, rx) = pitchcam::platform::recording_channel();
//! coordinator.start(&mut controller, &preset, tx)?;
//! // ...
//! coordinator.stop(&mut controller)?;
//! let completed = coordinator.handle_event(&mut controller, rx.recv()?)?;
//! ```

mod coordinator;
mod metadata;
mod sidecar;

pub use coordinator::{CompletedRecording, RecordingSessionCoordinator};
pub use metadata::RecordingMetadata;
pub use sidecar::{
    next_recording_path, read_sidecar, recording_file_name, sidecar_path, write_sidecar,
    RecordingStore, SidecarStore,
};
