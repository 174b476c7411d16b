use super::metadata::RecordingMetadata;
use super::sidecar::{next_recording_path, RecordingStore, SidecarStore};
use crate::config::RecordingConfig;
use crate::errors::CaptureError;
use crate::exposure::PresetSettings;
use crate::platform::{RecordingEvent, RecordingEventSender, SessionBackend};
use crate::session::CaptureSessionController;
use crate::timing::RecordingClock;
use chrono::{Local, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

/// A recording that finished and was handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRecording {
    pub id: Uuid,
    pub media: PathBuf,
    /// `None` when the sidecar could not be written; the movie is kept.
    pub sidecar: Option<PathBuf>,
    pub metadata: RecordingMetadata,
    pub duration: Duration,
}

struct InFlightRecording {
    id: Uuid,
    output: PathBuf,
    metadata: RecordingMetadata,
    clock: RecordingClock,
}

/// Starts and stops recordings on a controller and pairs each finished
/// movie with the metadata captured when it started.
pub struct RecordingSessionCoordinator<S: RecordingStore = SidecarStore> {
    store: S,
    output_directory: PathBuf,
    file_extension: String,
    in_flight: Option<InFlightRecording>,
}

impl RecordingSessionCoordinator<SidecarStore> {
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self::new(SidecarStore, config.output_path(), &config.file_extension)
    }
}

impl<S: RecordingStore> RecordingSessionCoordinator<S> {
    pub fn new(store: S, output_directory: impl Into<PathBuf>, file_extension: &str) -> Self {
        Self {
            store,
            output_directory: output_directory.into(),
            file_extension: file_extension.to_string(),
            in_flight: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn elapsed(&self) -> Option<Duration> {
        self.in_flight.as_ref().map(|r| r.clock.elapsed())
    }

    pub fn current_output(&self) -> Option<&Path> {
        self.in_flight.as_ref().map(|r| r.output.as_path())
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    /// Begin a recording and snapshot its metadata. Completion is delivered
    /// on `events` and must be passed back through
    /// [`handle_event`](Self::handle_event).
    pub fn start<B: SessionBackend>(
        &mut self,
        controller: &mut CaptureSessionController<B>,
        settings: &PresetSettings,
        events: RecordingEventSender,
    ) -> Result<PathBuf, CaptureError> {
        if self.in_flight.is_some() {
            return Err(CaptureError::RecordingInProgress);
        }
        fs::create_dir_all(&self.output_directory)?;
        let output =
            next_recording_path(&self.output_directory, Local::now(), &self.file_extension);

        let config = controller.begin_recording(&output, events)?;
        let metadata =
            RecordingMetadata::capture(settings, &config, controller.audio_input(), Utc::now());

        let id = Uuid::new_v4();
        log::info!(
            "Recording {} to {:?} ({} preset, {} lens)",
            id,
            output,
            metadata.preset,
            config.lens
        );
        self.in_flight = Some(InFlightRecording {
            id,
            output: output.clone(),
            metadata,
            clock: RecordingClock::new(),
        });
        Ok(output)
    }

    pub fn stop<B: SessionBackend>(
        &mut self,
        controller: &mut CaptureSessionController<B>,
    ) -> Result<(), CaptureError> {
        if self.in_flight.is_none() {
            return Err(CaptureError::InvalidState(
                "no recording in progress".to_string(),
            ));
        }
        controller.request_stop_recording()
    }

    /// Finish the in-flight recording from its completion event.
    ///
    /// A finished movie is persisted with its sidecar; a sidecar failure is
    /// logged and the movie kept. A failed movie is removed and no metadata
    /// is written.
    pub fn handle_event<B: SessionBackend>(
        &mut self,
        controller: &mut CaptureSessionController<B>,
        event: RecordingEvent,
    ) -> Result<CompletedRecording, CaptureError> {
        controller.recording_finished();
        let recording = self.in_flight.take().ok_or_else(|| {
            CaptureError::InvalidState("recording event without a recording in flight".to_string())
        })?;
        let duration = recording.clock.elapsed();

        match event {
            RecordingEvent::Finished { output } => {
                let sidecar = match self.store.persist(&output, &recording.metadata) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::warn!("Keeping {:?} without metadata: {}", output, e);
                        None
                    }
                };
                log::info!("Recording {} finished after {:?}", recording.id, duration);
                Ok(CompletedRecording {
                    id: recording.id,
                    media: output,
                    sidecar,
                    metadata: recording.metadata,
                    duration,
                })
            }
            RecordingEvent::Failed { output, reason } => {
                log::warn!("Recording {} failed: {}", recording.id, reason);
                if let Err(e) = self.store.discard(&output) {
                    log::warn!("Could not remove partial recording {:?}: {}", output, e);
                }
                Err(CaptureError::RecordingFailed(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exposure::ShootingPreset;
    use crate::platform::{recording_channel, SimulatedBackend};
    use crate::session::ControllerSettings;
    use crate::types::FovMode;

    fn running_controller() -> CaptureSessionController<SimulatedBackend> {
        let mut controller = CaptureSessionController::new(
            SimulatedBackend::iphone(),
            ControllerSettings::default(),
        );
        controller.setup().unwrap();
        controller.start().unwrap();
        controller
    }

    #[test]
    fn test_finished_recording_gets_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = running_controller();
        controller.set_fov_mode(FovMode::Maximized).unwrap();
        let mut coordinator = RecordingSessionCoordinator::new(SidecarStore, dir.path(), "mov");
        let (tx, rx) = recording_channel();

        let output = coordinator
            .start(&mut controller, &ShootingPreset::Floodlight.settings(), tx)
            .unwrap();
        assert!(coordinator.is_recording());
        assert!(output.file_name().unwrap().to_str().unwrap().starts_with("pitch_"));

        coordinator.stop(&mut controller).unwrap();
        let completed = coordinator
            .handle_event(&mut controller, rx.recv().unwrap())
            .unwrap();

        assert!(!controller.is_recording());
        assert_eq!(completed.media, output);
        let sidecar = completed.sidecar.unwrap();
        let stored = super::super::read_sidecar(&sidecar).unwrap();
        assert_eq!(stored.preset, "floodlight");
        assert_eq!(stored.max_fov, Some(true));
        assert_eq!(stored.audio_enabled, Some(true));
    }

    #[test]
    fn test_failed_recording_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = running_controller();
        let mut coordinator = RecordingSessionCoordinator::new(SidecarStore, dir.path(), "mov");
        let (tx, rx) = recording_channel();

        let output = coordinator
            .start(&mut controller, &PresetSettings::default(), tx)
            .unwrap();
        controller.backend().handle().update_faults(|f| f.fail_recording = true);
        coordinator.stop(&mut controller).unwrap();

        let err = coordinator
            .handle_event(&mut controller, rx.recv().unwrap())
            .unwrap_err();
        assert!(matches!(err, CaptureError::RecordingFailed(_)));
        assert!(!output.exists());
        assert!(!super::super::sidecar_path(&output).exists());
        assert!(!coordinator.is_recording());
    }

    #[test]
    fn test_second_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = running_controller();
        let mut coordinator = RecordingSessionCoordinator::new(SidecarStore, dir.path(), "mov");
        let (tx, _rx) = recording_channel();
        coordinator
            .start(&mut controller, &PresetSettings::default(), tx.clone())
            .unwrap();
        assert_eq!(
            coordinator
                .start(&mut controller, &PresetSettings::default(), tx)
                .unwrap_err(),
            CaptureError::RecordingInProgress
        );
    }
}
