//! Distortion-correction and anti-crop policy.

use crate::errors::CaptureError;
use crate::platform::SessionBackend;
use crate::session::ConfigurationTransaction;
use crate::types::FovMode;
use serde::{Deserialize, Serialize};

/// Zoom factor that shows the full sensor readout.
pub const UNCROPPED_ZOOM: f64 = 1.0;

/// Distortion-correction decision for one mode on one device.
///
/// `enabled` is the value the engine wants; `applied` says whether that
/// value is actually pushed to the hardware, which only happens when the
/// device supports correction at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionState {
    pub enabled: bool,
    pub applied: bool,
}

impl CorrectionState {
    /// Overlay text: "On", "Off" or "N/A" when the device has no GDC.
    pub fn label(&self) -> &'static str {
        match (self.applied, self.enabled) {
            (false, _) => "N/A",
            (true, true) => "On",
            (true, false) => "Off",
        }
    }
}

pub struct DistortionPolicy;

impl DistortionPolicy {
    pub fn correction_state(mode: FovMode, device_supports_correction: bool) -> CorrectionState {
        CorrectionState {
            enabled: mode == FovMode::Standard && device_supports_correction,
            applied: device_supports_correction,
        }
    }

    /// Stage the correction decision. Unsupported devices are left alone.
    pub fn apply<B: SessionBackend + ?Sized>(
        tx: &mut ConfigurationTransaction<'_, B>,
        state: CorrectionState,
    ) -> Result<(), CaptureError> {
        if state.applied {
            tx.set_distortion_correction(state.enabled)?;
        }
        Ok(())
    }
}

/// What `disable_all_cropping_features` changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CroppingOutcome {
    pub center_stage_disabled: bool,
    pub zoom_factor: f64,
}

/// Turn off every feature that narrows the captured angle: auto-framing if
/// it is currently active, and any zoom. Independent of GDC support.
/// Only used when entering maximized FOV.
pub fn disable_all_cropping_features<B: SessionBackend + ?Sized>(
    tx: &mut ConfigurationTransaction<'_, B>,
) -> Result<CroppingOutcome, CaptureError> {
    let center_stage_active = tx.backend().live_readings().center_stage_active;
    if center_stage_active {
        log::info!("Disabling Center Stage for maximized FOV");
        tx.set_center_stage(false)?;
    }
    tx.set_zoom_factor(UNCROPPED_ZOOM)?;
    Ok(CroppingOutcome {
        center_stage_disabled: center_stage_active,
        zoom_factor: UNCROPPED_ZOOM,
    })
}
