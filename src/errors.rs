use thiserror::Error;

/// Every failure the capture engine can surface.
///
/// All variants are recoverable at the operation level. The worker publishes
/// the most recent one as the "current error", so the type is `Clone`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaptureError {
    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Failed to attach input: {0}")]
    InputAttachFailed(String),
    #[error("Failed to attach output: {0}")]
    OutputAttachFailed(String),
    #[error("No suitable capture format: {0}")]
    NoSuitableFormat(String),
    #[error("Operation rejected while a recording is in progress")]
    RecordingInProgress,
    #[error("Recording failed: {0}")]
    RecordingFailed(String),
    #[error("Invalid session state: {0}")]
    InvalidState(String),
    #[error("Configuration transaction failed: {0}")]
    ConfigurationFailed(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::Serialization(err.to_string())
    }
}
