//! Flat-file persistence: one JSON sidecar per movie file.

use super::metadata::RecordingMetadata;
use crate::errors::CaptureError;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

/// Receives finished recordings from the coordinator.
pub trait RecordingStore: Send {
    /// Store the metadata for a finished movie. Returns where it went.
    fn persist(&self, media: &Path, metadata: &RecordingMetadata) -> Result<PathBuf, CaptureError>;

    /// Remove what is left of a failed recording.
    fn discard(&self, media: &Path) -> Result<(), CaptureError>;
}

/// Writes `<stem>.json` next to each movie.
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarStore;

impl RecordingStore for SidecarStore {
    fn persist(&self, media: &Path, metadata: &RecordingMetadata) -> Result<PathBuf, CaptureError> {
        write_sidecar(media, metadata)
    }

    fn discard(&self, media: &Path) -> Result<(), CaptureError> {
        match fs::remove_file(media) {
            Ok(()) => {
                log::info!("Removed partial recording {:?}", media);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn sidecar_path(media: &Path) -> PathBuf {
    media.with_extension("json")
}

/// `pitch_<YYYYMMDD_HHMMSS>.<ext>`
pub fn recording_file_name(started: DateTime<Local>, extension: &str) -> String {
    format!("pitch_{}.{}", started.format("%Y%m%d_%H%M%S"), extension)
}

/// First free recording path in `directory` for the given start time.
/// Recordings started within the same second get a numeric suffix.
pub fn next_recording_path(directory: &Path, started: DateTime<Local>, extension: &str) -> PathBuf {
    let candidate = directory.join(recording_file_name(started, extension));
    if !candidate.exists() {
        return candidate;
    }
    let stem = format!("pitch_{}", started.format("%Y%m%d_%H%M%S"));
    (1..)
        .map(|n| directory.join(format!("{}_{}.{}", stem, n, extension)))
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

pub fn write_sidecar(media: &Path, metadata: &RecordingMetadata) -> Result<PathBuf, CaptureError> {
    let path = sidecar_path(media);
    let json = serde_json::to_string_pretty(metadata)?;
    fs::write(&path, json)?;
    log::debug!("Wrote sidecar {:?}", path);
    Ok(path)
}

pub fn read_sidecar(path: &Path) -> Result<RecordingMetadata, CaptureError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}
