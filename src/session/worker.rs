//! Serialized session worker.
//!
//! A single thread owns the controller and the recording coordinator.
//! Requests arrive as fire-and-forget commands over a channel; results are
//! only observable through the published state.

use super::controller::{CaptureSessionController, ControllerSettings};
use super::state::SessionState;
use crate::config::PitchCamConfig;
use crate::diagnostics::DebugSnapshot;
use crate::errors::CaptureError;
use crate::exposure::PresetSettings;
use crate::platform::{
    recording_channel, RecordingEvent, RecordingEventReceiver, RecordingEventSender,
    SessionBackend,
};
use crate::recording::{CompletedRecording, RecordingSessionCoordinator};
use crate::types::{AspectRatioTarget, FovMode, LensIdentity};
use crossbeam_channel::{select, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::watch;

/// Requests from the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureCommand {
    /// Configure the session if it has not been yet, then start it running.
    Setup,
    /// Start a configured or stopped session again.
    StartSession,
    SelectLens(LensIdentity),
    SetFovMode(FovMode),
    SetAspectRatio(AspectRatioTarget),
    ApplyPreset(PresetSettings),
    StartRecording(PresetSettings),
    StopRecording,
    ToggleMeteringGrid,
    ClearError,
    StopSession,
}

enum WorkerMessage {
    Command(CaptureCommand),
    /// Acknowledged once everything queued before it has been handled.
    Sync(Sender<()>),
    Shutdown,
}

/// Read-only view the worker publishes after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedState {
    pub session_state: SessionState,
    pub is_recording: bool,
    pub recording_duration: Duration,
    pub snapshot: Option<DebugSnapshot>,
    /// Most recent failure; replaced by the next one or cleared explicitly.
    pub current_error: Option<CaptureError>,
    pub metering_grid_visible: bool,
    pub exposure_preset: Option<String>,
    pub audio_input: Option<String>,
    pub last_recording: Option<CompletedRecording>,
}

impl Default for PublishedState {
    fn default() -> Self {
        Self {
            session_state: SessionState::Idle,
            is_recording: false,
            recording_duration: Duration::ZERO,
            snapshot: None,
            current_error: None,
            metering_grid_visible: false,
            exposure_preset: None,
            audio_input: None,
            last_recording: None,
        }
    }
}

struct Worker<B: SessionBackend> {
    controller: CaptureSessionController<B>,
    coordinator: RecordingSessionCoordinator,
    recording_tx: RecordingEventSender,
    recording_rx: RecordingEventReceiver,
    state_tx: watch::Sender<PublishedState>,
    current_error: Option<CaptureError>,
    metering_grid_visible: bool,
    last_recording: Option<CompletedRecording>,
    tick: Duration,
}

impl<B: SessionBackend> Worker<B> {
    fn run(mut self, commands: Receiver<WorkerMessage>) {
        log::debug!("Session worker started");
        let events = self.recording_rx.clone();
        let tick = self.tick;
        let mut running = true;
        while running {
            select! {
                recv(commands) -> message => {
                    self.drain_recording_events();
                    match message {
                        Ok(WorkerMessage::Command(command)) => self.handle(command),
                        Ok(WorkerMessage::Sync(ack)) => {
                            self.publish();
                            let _ = ack.send(());
                        }
                        Ok(WorkerMessage::Shutdown) | Err(_) => running = false,
                    }
                }
                recv(events) -> event => {
                    if let Ok(event) = event {
                        self.finish_recording(event);
                    }
                }
                default(tick) => {}
            }
            self.publish();
        }
        self.shutdown();
        log::debug!("Session worker exited");
    }

    fn handle(&mut self, command: CaptureCommand) {
        log::debug!("Handling {:?}", command);
        let result = match command {
            CaptureCommand::Setup => self.setup(),
            CaptureCommand::StartSession => self.controller.start(),
            CaptureCommand::SelectLens(lens) => self.controller.select_lens(lens),
            CaptureCommand::SetFovMode(mode) => self.controller.set_fov_mode(mode),
            CaptureCommand::SetAspectRatio(aspect) => self.controller.set_aspect_ratio(aspect),
            CaptureCommand::ApplyPreset(settings) => self.controller.apply_exposure(settings),
            CaptureCommand::StartRecording(settings) => self.start_recording(settings),
            CaptureCommand::StopRecording => self.coordinator.stop(&mut self.controller),
            CaptureCommand::ToggleMeteringGrid => {
                self.metering_grid_visible = !self.metering_grid_visible;
                Ok(())
            }
            CaptureCommand::ClearError => {
                self.current_error = None;
                Ok(())
            }
            CaptureCommand::StopSession => self.controller.stop(),
        };
        if let Err(e) = result {
            self.fail(e);
        }
    }

    /// A session whose setup committed but whose start timed out stays
    /// configured, so a repeated setup only retries the start.
    fn setup(&mut self) -> Result<(), CaptureError> {
        if self.controller.state() == SessionState::Idle {
            self.controller.setup()?;
        }
        self.controller.start()
    }

    fn start_recording(&mut self, settings: PresetSettings) -> Result<(), CaptureError> {
        if self.controller.is_recording() {
            return Err(CaptureError::RecordingInProgress);
        }
        if self.controller.state() != SessionState::Running {
            return Err(CaptureError::InvalidState(format!(
                "recording requires a running session (currently {})",
                self.controller.state()
            )));
        }
        // The preset stamped into the sidecar is the one actually applied.
        self.controller.apply_exposure(settings.clone())?;
        self.coordinator
            .start(&mut self.controller, &settings, self.recording_tx.clone())
            .map(|_| ())
    }

    fn drain_recording_events(&mut self) {
        while let Ok(event) = self.recording_rx.try_recv() {
            self.finish_recording(event);
        }
    }

    fn finish_recording(&mut self, event: RecordingEvent) {
        match self.coordinator.handle_event(&mut self.controller, event) {
            Ok(completed) => self.last_recording = Some(completed),
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: CaptureError) {
        log::warn!("{}", error);
        self.current_error = Some(error);
    }

    fn publish(&self) {
        let next = PublishedState {
            session_state: self.controller.state(),
            is_recording: self.controller.is_recording(),
            recording_duration: self.coordinator.elapsed().unwrap_or_default(),
            snapshot: self.controller.snapshot(),
            current_error: self.current_error.clone(),
            metering_grid_visible: self.metering_grid_visible,
            exposure_preset: self.controller.exposure().map(|s| s.label.clone()),
            audio_input: self.controller.audio_input().map(|a| a.name.clone()),
            last_recording: self.last_recording.clone(),
        };
        self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn shutdown(&mut self) {
        if self.coordinator.is_recording() {
            log::info!("Finishing in-flight recording before shutdown");
            match self.coordinator.stop(&mut self.controller) {
                Ok(()) => match self.recording_rx.recv_timeout(Duration::from_secs(2)) {
                    Ok(event) => self.finish_recording(event),
                    Err(_) => log::warn!("Recording did not report completion before shutdown"),
                },
                Err(e) => self.fail(e),
            }
        }
        if let Err(e) = self.controller.stop() {
            self.fail(e);
        }
        self.publish();
    }
}

/// Handle to the session worker thread.
pub struct CameraService {
    commands: Sender<WorkerMessage>,
    state: watch::Receiver<PublishedState>,
    worker: Option<JoinHandle<()>>,
}

impl CameraService {
    pub fn spawn<B: SessionBackend + 'static>(
        backend: B,
        config: &PitchCamConfig,
    ) -> Result<Self, CaptureError> {
        let (recording_tx, recording_rx) = recording_channel();
        let (state_tx, state) = watch::channel(PublishedState::default());
        let (commands, command_rx) = crossbeam_channel::unbounded();

        let worker = Worker {
            controller: CaptureSessionController::new(backend, ControllerSettings::from(config)),
            coordinator: RecordingSessionCoordinator::from_config(&config.recording),
            recording_tx,
            recording_rx,
            state_tx,
            current_error: None,
            metering_grid_visible: false,
            last_recording: None,
            tick: config.session.status_tick(),
        };

        let handle = std::thread::Builder::new()
            .name("pitchcam-session".to_string())
            .spawn(move || worker.run(command_rx))?;

        Ok(Self {
            commands,
            state,
            worker: Some(handle),
        })
    }

    /// Queue a command. Outcomes show up in the published state.
    pub fn send(&self, command: CaptureCommand) {
        if self.commands.send(WorkerMessage::Command(command)).is_err() {
            log::warn!("Session worker is gone, command dropped");
        }
    }

    pub fn setup(&self) {
        self.send(CaptureCommand::Setup);
    }

    pub fn start_session(&self) {
        self.send(CaptureCommand::StartSession);
    }

    pub fn select_lens(&self, lens: LensIdentity) {
        self.send(CaptureCommand::SelectLens(lens));
    }

    pub fn set_fov_mode(&self, mode: FovMode) {
        self.send(CaptureCommand::SetFovMode(mode));
    }

    pub fn set_aspect_ratio(&self, aspect: AspectRatioTarget) {
        self.send(CaptureCommand::SetAspectRatio(aspect));
    }

    pub fn apply_preset(&self, settings: PresetSettings) {
        self.send(CaptureCommand::ApplyPreset(settings));
    }

    pub fn start_recording(&self, settings: PresetSettings) {
        self.send(CaptureCommand::StartRecording(settings));
    }

    pub fn stop_recording(&self) {
        self.send(CaptureCommand::StopRecording);
    }

    pub fn toggle_metering_grid(&self) {
        self.send(CaptureCommand::ToggleMeteringGrid);
    }

    pub fn clear_error(&self) {
        self.send(CaptureCommand::ClearError);
    }

    pub fn stop_session(&self) {
        self.send(CaptureCommand::StopSession);
    }

    pub fn subscribe(&self) -> watch::Receiver<PublishedState> {
        self.state.clone()
    }

    pub fn state(&self) -> PublishedState {
        self.state.borrow().clone()
    }

    /// Wait until every command sent so far has been handled, then return
    /// the resulting state.
    pub fn sync(&self, timeout: Duration) -> Result<PublishedState, CaptureError> {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded(1);
        self.commands
            .send(WorkerMessage::Sync(ack_tx))
            .map_err(|_| CaptureError::InvalidState("session worker is gone".to_string()))?;
        ack_rx.recv_timeout(timeout).map_err(|e| sync_error(e, timeout))?;
        Ok(self.state())
    }

    /// Stop the session, finish any recording and join the worker.
    pub fn shutdown(mut self) -> Result<PublishedState, CaptureError> {
        self.join()?;
        Ok(self.state())
    }

    fn join(&mut self) -> Result<(), CaptureError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let _ = self.commands.send(WorkerMessage::Shutdown);
        handle
            .join()
            .map_err(|_| CaptureError::InvalidState("session worker panicked".to_string()))
    }
}

fn sync_error(error: RecvTimeoutError, timeout: Duration) -> CaptureError {
    match error {
        RecvTimeoutError::Timeout => CaptureError::InvalidState(format!(
            "session worker did not respond within {}ms",
            timeout.as_millis()
        )),
        // The worker dropped the ack without answering, so it has exited.
        RecvTimeoutError::Disconnected => {
            CaptureError::InvalidState("session worker is gone".to_string())
        }
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        if let Err(e) = self.join() {
            log::warn!("Error stopping session worker: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_errors_distinguish_exit_from_timeout() {
        let timeout = Duration::from_millis(250);

        let timed_out = sync_error(RecvTimeoutError::Timeout, timeout);
        assert_eq!(
            timed_out,
            CaptureError::InvalidState("session worker did not respond within 250ms".to_string())
        );

        let gone = sync_error(RecvTimeoutError::Disconnected, timeout);
        assert_eq!(
            gone,
            CaptureError::InvalidState("session worker is gone".to_string())
        );
    }

    #[test]
    fn test_dropped_ack_reports_worker_gone() {
        let (ack_tx, ack_rx) = crossbeam_channel::bounded::<()>(1);
        drop(ack_tx);
        let timeout = Duration::from_secs(5);

        let error = ack_rx
            .recv_timeout(timeout)
            .map_err(|e| sync_error(e, timeout))
            .unwrap_err();
        assert_eq!(
            error,
            CaptureError::InvalidState("session worker is gone".to_string())
        );
    }
}
