//! Per-recording metadata written next to the movie file.

use crate::exposure::{MeteringZone, PresetSettings};
use crate::platform::AudioInput;
use crate::session::ActiveConfiguration;
use crate::types::LensIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Exposure and capture configuration in effect when a recording started.
///
/// Only the exposure fields and `recordedAt` are required when reading a
/// sidecar; older sidecars without the capture fields still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingMetadata {
    pub preset: String,
    pub exposure_bias: f32,
    pub metering_zone: MeteringZone,
    pub iso: f32,
    pub white_balance: f32,
    pub recorded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lens: Option<LensIdentity>,
    #[serde(rename = "maxFOV", default, skip_serializing_if = "Option::is_none")]
    pub max_fov: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_input_name: Option<String>,
}

impl RecordingMetadata {
    /// Stamp the exposure settings and the active configuration.
    pub fn capture(
        settings: &PresetSettings,
        config: &ActiveConfiguration,
        audio: Option<&AudioInput>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            preset: settings.label.clone(),
            exposure_bias: settings.exposure_bias,
            metering_zone: settings.metering_zone,
            iso: settings.iso,
            white_balance: settings.white_balance,
            recorded_at,
            lens: Some(config.lens),
            max_fov: Some(config.fov_mode.is_maximized()),
            aspect_ratio: Some(config.aspect_target.label().to_string()),
            audio_enabled: Some(audio.is_some()),
            audio_input_name: audio.map(|a| a.name.clone()),
        }
    }
}
