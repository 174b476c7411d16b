//! Hardware seam for the capture session.
//!
//! Everything the engine needs from the platform camera stack goes through
//! [`SessionBackend`]. Mutating calls are only valid between
//! `begin_configuration` and `commit_configuration`/`abort_configuration`;
//! the controller never calls them directly and instead goes through
//! [`crate::session::ConfigurationTransaction`].

use crate::errors::CaptureError;
use crate::exposure::PresetSettings;
use crate::types::{CaptureFormat, LensIdentity, SessionPreset, StabilizationMode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod simulated;

pub use simulated::{FaultPlan, LensProfile, SimulatedBackend, SimulatedHandle};

/// Static description of one lens device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub lens: LensIdentity,
    pub name: String,
    pub supports_distortion_correction: bool,
    pub supports_center_stage: bool,
}

impl DeviceInfo {
    pub fn new(lens: LensIdentity, name: impl Into<String>) -> Self {
        Self {
            lens,
            name: name.into(),
            supports_distortion_correction: false,
            supports_center_stage: false,
        }
    }

    pub fn with_distortion_correction(mut self, supported: bool) -> Self {
        self.supports_distortion_correction = supported;
        self
    }

    pub fn with_center_stage(mut self, supported: bool) -> Self {
        self.supports_center_stage = supported;
        self
    }
}

/// Values read back from the live session. These can differ from what was
/// requested when the hardware cannot honor a setting.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveReadings {
    pub active_lens: Option<LensIdentity>,
    pub min_frame_duration: Option<Duration>,
    pub stabilization_mode: StabilizationMode,
    pub zoom_factor: f64,
    pub distortion_correction_enabled: bool,
    pub center_stage_active: bool,
    pub session_preset: SessionPreset,
}

impl LiveReadings {
    /// Realized frame rate derived from the active minimum frame duration.
    pub fn frame_rate(&self) -> Option<f64> {
        self.min_frame_duration
            .filter(|d| !d.is_zero())
            .map(|d| 1.0 / d.as_secs_f64())
    }
}

impl Default for LiveReadings {
    fn default() -> Self {
        Self {
            active_lens: None,
            min_frame_duration: None,
            stabilization_mode: StabilizationMode::Off,
            zoom_factor: 1.0,
            distortion_correction_enabled: false,
            center_stage_active: false,
            session_preset: SessionPreset::High,
        }
    }
}

/// Microphone currently routed into the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioInput {
    pub name: String,
}

/// Completion notification for a movie recording, sent exactly once per
/// started recording.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingEvent {
    Finished { output: PathBuf },
    Failed { output: PathBuf, reason: String },
}

pub type RecordingEventSender = crossbeam_channel::Sender<RecordingEvent>;
pub type RecordingEventReceiver = crossbeam_channel::Receiver<RecordingEvent>;

pub fn recording_channel() -> (RecordingEventSender, RecordingEventReceiver) {
    crossbeam_channel::unbounded()
}

pub trait SessionBackend: Send {
    fn has_device(&self, lens: LensIdentity) -> bool;

    /// Fails with `DeviceUnavailable` when the lens is absent.
    fn device_info(&self, lens: LensIdentity) -> Result<DeviceInfo, CaptureError>;

    /// Current discrete formats for a lens, in device order.
    fn formats(&self, lens: LensIdentity) -> Result<Vec<CaptureFormat>, CaptureError>;

    fn begin_configuration(&mut self);
    fn commit_configuration(&mut self) -> Result<(), CaptureError>;
    /// Drop all staged changes. The committed configuration stays live.
    fn abort_configuration(&mut self);

    fn attach_input(&mut self, lens: LensIdentity) -> Result<(), CaptureError>;
    fn detach_input(&mut self);
    fn attach_movie_output(&mut self) -> Result<(), CaptureError>;
    fn attach_audio_input(&mut self) -> Result<AudioInput, CaptureError>;

    fn set_session_preset(&mut self, preset: SessionPreset) -> Result<(), CaptureError>;
    fn set_active_format(
        &mut self,
        format: &CaptureFormat,
        frame_rate: f64,
    ) -> Result<(), CaptureError>;
    fn set_distortion_correction(&mut self, enabled: bool) -> Result<(), CaptureError>;
    fn set_stabilization(&mut self, mode: StabilizationMode) -> Result<(), CaptureError>;
    fn set_zoom_factor(&mut self, zoom: f64) -> Result<(), CaptureError>;
    fn set_center_stage(&mut self, enabled: bool) -> Result<(), CaptureError>;

    /// Ask the hardware to start. Running is confirmed through `is_running`.
    fn start_running(&mut self) -> Result<(), CaptureError>;
    fn is_running(&self) -> bool;
    fn stop_running(&mut self);

    fn live_readings(&self) -> LiveReadings;

    /// Exposure/metering pass-through.
    fn apply_exposure(&mut self, settings: &PresetSettings) -> Result<(), CaptureError>;

    fn audio_input(&self) -> Option<AudioInput>;

    /// Begin writing a movie to `output`. Completion is reported on `events`.
    fn start_recording(
        &mut self,
        output: &Path,
        events: RecordingEventSender,
    ) -> Result<(), CaptureError>;
    fn stop_recording(&mut self) -> Result<(), CaptureError>;
}
