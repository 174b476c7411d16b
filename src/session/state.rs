use crate::distortion::CorrectionState;
use crate::types::{AspectRatioTarget, CaptureFormat, FovMode, LensIdentity, SessionPreset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the hardware capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Configuring,
    Running,
    Reconfiguring,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Configuring => "configuring",
            SessionState::Running => "running",
            SessionState::Reconfiguring => "reconfiguring",
            SessionState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The configuration currently committed to the hardware.
///
/// Owned by the controller and replaced wholesale after each successful
/// transaction; a failed transaction leaves the previous value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveConfiguration {
    pub lens: LensIdentity,
    pub fov_mode: FovMode,
    pub aspect_target: AspectRatioTarget,
    pub selected_format: CaptureFormat,
    /// Rate requested from the selected format's range.
    pub frame_rate: f64,
    pub correction: CorrectionState,
    pub stabilization_off: bool,
    pub zoom_factor: f64,
    pub center_stage_active: bool,
    pub session_preset: SessionPreset,
    /// Set when selection had to drop a preference.
    pub selection_fallback: Option<String>,
    pub session_running: bool,
    pub is_recording: bool,
}

impl ActiveConfiguration {
    pub fn gdc_enabled(&self) -> bool {
        self.correction.enabled
    }

    pub fn gdc_supported(&self) -> bool {
        self.correction.applied
    }
}

/// A lens/FOV/aspect change. `None` keeps the current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconfigureRequest {
    pub lens: Option<LensIdentity>,
    pub fov_mode: Option<FovMode>,
    pub aspect: Option<AspectRatioTarget>,
}

impl ReconfigureRequest {
    pub fn lens(lens: LensIdentity) -> Self {
        Self {
            lens: Some(lens),
            ..Self::default()
        }
    }

    pub fn fov_mode(mode: FovMode) -> Self {
        Self {
            fov_mode: Some(mode),
            ..Self::default()
        }
    }

    pub fn aspect(aspect: AspectRatioTarget) -> Self {
        Self {
            aspect: Some(aspect),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lens.is_none() && self.fov_mode.is_none() && self.aspect.is_none()
    }
}
