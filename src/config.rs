//! Configuration management for pitchcam
//!
//! Provides loading, saving and validation of the capture defaults, session
//! timing and recording output settings.

use crate::errors::CaptureError;
use crate::format::DEFAULT_ASPECT_TOLERANCE;
use crate::types::{AspectRatioTarget, FovMode, LensIdentity};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PitchCamConfig {
    pub capture: CaptureConfig,
    pub session: SessionConfig,
    pub recording: RecordingConfig,
}

/// Format negotiation defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Minimum frame rate a selected format must reach
    pub target_frame_rate: f64,
    /// Lens acquired by session setup
    pub default_lens: LensIdentity,
    pub default_aspect: AspectRatioTarget,
    pub default_fov_mode: FovMode,
    /// Allowed slack on the width/height ratio
    pub aspect_tolerance: f64,
}

/// Worker and hardware timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Upper bound for the hardware session to report running
    pub start_timeout_ms: u64,
    /// How often the running state is polled during start
    pub poll_interval_ms: u64,
    /// Duration counter refresh while recording
    pub status_tick_ms: u64,
}

/// Recording output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_directory: String,
    /// Movie container extension, without the dot
    pub file_extension: String,
    /// Route the default microphone into recordings
    pub audio_enabled: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            target_frame_rate: 30.0,
            default_lens: LensIdentity::UltraWide,
            default_aspect: AspectRatioTarget::Wide16x9,
            default_fov_mode: FovMode::Standard,
            aspect_tolerance: DEFAULT_ASPECT_TOLERANCE,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            start_timeout_ms: 3000,
            poll_interval_ms: 10,
            status_tick_ms: 250,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_directory: "./recordings".to_string(),
            file_extension: "mov".to_string(),
            audio_enabled: true,
        }
    }
}

impl SessionConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn status_tick(&self) -> Duration {
        Duration::from_millis(self.status_tick_ms)
    }
}

impl RecordingConfig {
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }
}

impl PitchCamConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CaptureError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| CaptureError::Config(format!("Failed to read config file: {}", e)))?;

        let config: PitchCamConfig = toml::from_str(&contents)
            .map_err(|e| CaptureError::Config(format!("Failed to parse config file: {}", e)))?;

        config.validate().map_err(CaptureError::Config)?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CaptureError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                CaptureError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| CaptureError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| CaptureError::Config(format!("Failed to write config file: {}", e)))?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("pitchcam.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !(self.capture.target_frame_rate > 0.0 && self.capture.target_frame_rate <= 240.0) {
            return Err("Target frame rate must be between 1 and 240".to_string());
        }
        if !(0.0..=0.5).contains(&self.capture.aspect_tolerance) {
            return Err("Aspect tolerance must be between 0.0 and 0.5".to_string());
        }

        if !(100..=10_000).contains(&self.session.start_timeout_ms) {
            return Err("Session start timeout must be between 100 and 10000 ms".to_string());
        }
        if self.session.poll_interval_ms == 0
            || self.session.poll_interval_ms > self.session.start_timeout_ms
        {
            return Err("Poll interval must be positive and below the start timeout".to_string());
        }
        if self.session.status_tick_ms == 0 {
            return Err("Status tick must be positive".to_string());
        }

        if self.recording.output_directory.trim().is_empty() {
            return Err("Output directory must not be empty".to_string());
        }
        let ext = &self.recording.file_extension;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("Invalid file extension '{}'", ext));
        }

        Ok(())
    }
}
