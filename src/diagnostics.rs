//! Field-verification snapshot of the active capture configuration.

use crate::format::aspect::ratio_label;
use crate::platform::LiveReadings;
use crate::session::ActiveConfiguration;
use serde::{Deserialize, Serialize};

/// Flat, human-auditable record of what the hardware is actually doing.
///
/// Rebuilt after every configuration change and never persisted. Values
/// that the hardware reports back (frame duration, stabilization, zoom,
/// Center Stage, preset) win over what was requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugSnapshot {
    pub resolution: String,
    pub fov_degrees: f64,
    pub frame_rate: f64,
    pub aspect_ratio: String,
    pub gdc_enabled: bool,
    pub gdc_supported: bool,
    pub stabilization_mode: String,
    pub session_preset: String,
    pub lens: String,
    pub zoom_factor: f64,
    pub fov_mode_enabled: bool,
    pub center_stage_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_fallback: Option<String>,
}

impl DebugSnapshot {
    pub fn gdc_label(&self) -> &'static str {
        match (self.gdc_supported, self.gdc_enabled) {
            (false, _) => "N/A",
            (true, true) => "On",
            (true, false) => "Off",
        }
    }

    /// Overlay lines, one fact per line.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Lens: {}", self.lens),
            format!("Format: {} ({})", self.resolution, self.aspect_ratio),
            format!("FOV: {:.1}\u{b0}", self.fov_degrees),
            format!("FPS: {:.1}", self.frame_rate),
            format!("GDC: {}", self.gdc_label()),
            format!("Stabilization: {}", self.stabilization_mode),
            format!("Preset: {}", self.session_preset),
            format!("Zoom: {:.2}x", self.zoom_factor),
            format!("Max FOV: {}", if self.fov_mode_enabled { "On" } else { "Off" }),
            format!(
                "Center Stage: {}",
                if self.center_stage_active { "On" } else { "Off" }
            ),
        ];
        if let Some(fallback) = &self.selection_fallback {
            lines.push(format!("Degraded: {}", fallback));
        }
        lines
    }
}

/// Derive the snapshot from the committed configuration and live readings.
pub fn build_snapshot(config: &ActiveConfiguration, live: &LiveReadings) -> DebugSnapshot {
    let format = &config.selected_format;
    DebugSnapshot {
        resolution: format.resolution_label(),
        fov_degrees: format.field_of_view,
        frame_rate: live.frame_rate().unwrap_or(config.frame_rate),
        aspect_ratio: ratio_label(format.width, format.height),
        gdc_enabled: config.gdc_supported() && live.distortion_correction_enabled,
        gdc_supported: config.gdc_supported(),
        stabilization_mode: live.stabilization_mode.to_string(),
        session_preset: live.session_preset.to_string(),
        lens: config.lens.label().to_string(),
        zoom_factor: live.zoom_factor,
        fov_mode_enabled: config.fov_mode.is_maximized(),
        center_stage_active: live.center_stage_active,
        selection_fallback: config.selection_fallback.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distortion::CorrectionState;
    use crate::types::{
        AspectRatioTarget, CaptureFormat, FovMode, LensIdentity, SessionPreset, StabilizationMode,
    };
    use std::time::Duration;

    fn config() -> ActiveConfiguration {
        ActiveConfiguration {
            lens: LensIdentity::UltraWide,
            fov_mode: FovMode::Maximized,
            aspect_target: AspectRatioTarget::Classic4x3,
            selected_format: CaptureFormat::new(4032, 3024, 108.4, 30.0),
            frame_rate: 30.0,
            correction: CorrectionState {
                enabled: false,
                applied: true,
            },
            stabilization_off: true,
            zoom_factor: 1.0,
            center_stage_active: false,
            session_preset: SessionPreset::InputPriority,
            selection_fallback: None,
            session_running: true,
            is_recording: false,
        }
    }

    #[test]
    fn test_snapshot_prefers_live_values() {
        let live = LiveReadings {
            active_lens: Some(LensIdentity::UltraWide),
            min_frame_duration: Some(Duration::from_secs_f64(1.0 / 24.0)),
            stabilization_mode: StabilizationMode::Off,
            zoom_factor: 1.0,
            distortion_correction_enabled: false,
            center_stage_active: false,
            session_preset: SessionPreset::InputPriority,
        };
        let snapshot = build_snapshot(&config(), &live);

        assert_eq!(snapshot.resolution, "4032x3024");
        assert_eq!(snapshot.aspect_ratio, "4:3");
        assert!((snapshot.frame_rate - 24.0).abs() < 1e-6);
        assert_eq!(snapshot.stabilization_mode, "off");
        assert_eq!(snapshot.session_preset, "inputPriority");
        assert_eq!(snapshot.gdc_label(), "Off");
        assert!(snapshot.fov_mode_enabled);
    }

    #[test]
    fn test_snapshot_falls_back_to_requested_rate() {
        let snapshot = build_snapshot(&config(), &LiveReadings::default());
        assert_eq!(snapshot.frame_rate, 30.0);
    }

    #[test]
    fn test_unsupported_gdc_reads_not_applicable() {
        let mut cfg = config();
        cfg.correction = CorrectionState {
            enabled: false,
            applied: false,
        };
        let live = LiveReadings {
            distortion_correction_enabled: true,
            ..LiveReadings::default()
        };
        let snapshot = build_snapshot(&cfg, &live);
        assert!(!snapshot.gdc_enabled);
        assert_eq!(snapshot.gdc_label(), "N/A");
    }

    #[test]
    fn test_degraded_selection_is_visible() {
        let mut cfg = config();
        cfg.selection_fallback = Some("requested aspect ratio unavailable".to_string());
        let snapshot = build_snapshot(&cfg, &LiveReadings::default());
        assert!(snapshot.lines().iter().any(|l| l.starts_with("Degraded:")));

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["selectionFallback"], "requested aspect ratio unavailable");
        assert_eq!(json["fovModeEnabled"], true);
    }
}
