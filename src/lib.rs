//! pitchcam: capture configuration engine for wide-angle pitch recording
//!
//! Negotiates the hardware capture format that gives the widest usable
//! field of view on a phone's ultrawide lens (with or without a clip-on
//! fisheye), keeps distortion correction, stabilization and zoom in the
//! state that mode requires, and records with the effective configuration
//! stamped into a JSON sidecar next to every movie.
//!
//! # Features
//! - FOV-first and resolution-first format selection with aspect fallback
//! - Atomic begin/commit reconfiguration that never leaves partial state
//! - Live diagnostic snapshot of what the hardware actually reports
//! - Serialized session worker with published, read-only state
//! - Exposure presets and a 3x3 metering grid
//!
//! # Usage
//! ```rust,ignore
//! use pitchcam::platform::SimulatedBackend;
//! use pitchcam::{CameraService, PitchCamConfig, ShootingPreset};
//!
//! pitchcam::init_logging();
//! let config = PitchCamConfig::load_or_default();
//! let service = CameraService::spawn(SimulatedBackend::iphone(), &config)?;
//! service.setup();
//! service.set_fov_mode(pitchcam::FovMode::Maximized);
//! service.start_recording(ShootingPreset::Floodlight.settings());
//! ```
pub mod config;
pub mod diagnostics;
pub mod distortion;
pub mod errors;
pub mod exposure;
pub mod format;
pub mod invariant_ppt;
pub mod platform;
pub mod recording;
pub mod session;
pub mod timing;
pub mod types;

// Testing utilities - synthetic device catalogs for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::PitchCamConfig;
pub use diagnostics::{build_snapshot, DebugSnapshot};
pub use distortion::{disable_all_cropping_features, CorrectionState, DistortionPolicy};
pub use errors::CaptureError;
pub use exposure::{MeteringZone, PresetSettings, ShootingPreset};
pub use format::{list_formats, select_best_format, FormatCatalog};
pub use platform::{SessionBackend, SimulatedBackend};
pub use recording::{RecordingMetadata, RecordingSessionCoordinator};
pub use session::{
    ActiveConfiguration, CameraService, CaptureCommand, CaptureSessionController,
    PublishedState, SessionState,
};
pub use types::{AspectRatioTarget, CaptureFormat, FovMode, LensIdentity};

/// Initialize logging for the capture engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "pitchcam=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "pitchcam");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }
}
