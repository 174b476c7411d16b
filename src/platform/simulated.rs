//! In-process capture backend.
//!
//! Models the staged/committed split of a real capture session so that
//! aborted transactions are observable, and supports fault injection for
//! every failure the controller has to survive. Cloned [`SimulatedHandle`]s
//! share state with the backend after it has been moved into a controller.

use super::{
    AudioInput, DeviceInfo, LiveReadings, RecordingEvent, RecordingEventSender, SessionBackend,
};
use crate::errors::CaptureError;
use crate::exposure::PresetSettings;
use crate::testing::fixtures;
use crate::types::{CaptureFormat, LensIdentity, SessionPreset, StabilizationMode};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A lens the simulated phone exposes.
#[derive(Debug, Clone)]
pub struct LensProfile {
    pub info: DeviceInfo,
    pub formats: Vec<CaptureFormat>,
}

impl LensProfile {
    pub fn new(info: DeviceInfo, formats: Vec<CaptureFormat>) -> Self {
        Self { info, formats }
    }
}

/// Failures to inject. Each flag stays set until cleared through the handle.
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    pub fail_input_attach: bool,
    pub fail_output_attach: bool,
    pub fail_audio_attach: bool,
    pub fail_commit: bool,
    pub never_runs: bool,
    pub fail_recording_start: bool,
    /// The recording starts but completes with a failure event.
    pub fail_recording: bool,
    /// Stabilization writes are accepted but the device keeps its mode.
    pub stabilization_stuck: bool,
    /// Delay between `start_running` and the session reporting active.
    pub spin_up: Duration,
}

#[derive(Debug, Clone)]
struct HardwareState {
    input: Option<LensIdentity>,
    movie_output: bool,
    audio: Option<AudioInput>,
    preset: SessionPreset,
    format: Option<CaptureFormat>,
    frame_rate: Option<f64>,
    distortion_correction: bool,
    stabilization: StabilizationMode,
    zoom: f64,
    center_stage: bool,
}

impl Default for HardwareState {
    fn default() -> Self {
        Self {
            input: None,
            movie_output: false,
            audio: None,
            preset: SessionPreset::High,
            format: None,
            frame_rate: None,
            // Platform default: correction on, stabilization on.
            distortion_correction: true,
            stabilization: StabilizationMode::Auto,
            zoom: 1.0,
            center_stage: false,
        }
    }
}

struct ActiveRecording {
    output: PathBuf,
    events: RecordingEventSender,
}

struct SimState {
    profiles: Vec<LensProfile>,
    committed: HardwareState,
    staged: Option<HardwareState>,
    ready_at: Option<Instant>,
    faults: FaultPlan,
    exposure: Option<PresetSettings>,
    recording: Option<ActiveRecording>,
    microphone: String,
    commits: u64,
    aborts: u64,
}

impl SimState {
    fn profile(&self, lens: LensIdentity) -> Result<&LensProfile, CaptureError> {
        self.profiles
            .iter()
            .find(|p| p.info.lens == lens)
            .ok_or_else(|| {
                CaptureError::DeviceUnavailable(format!("no {} lens on this device", lens))
            })
    }

    fn staged_mut(&mut self) -> Result<&mut HardwareState, CaptureError> {
        self.staged.as_mut().ok_or_else(|| {
            CaptureError::ConfigurationFailed("no open configuration transaction".to_string())
        })
    }
}

pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

/// Shared view into a [`SimulatedBackend`] for fault injection and inspection.
#[derive(Clone)]
pub struct SimulatedHandle {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedBackend {
    pub fn new(profiles: Vec<LensProfile>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                profiles,
                committed: HardwareState::default(),
                staged: None,
                ready_at: None,
                faults: FaultPlan::default(),
                exposure: None,
                recording: None,
                microphone: "Built-In Microphone".to_string(),
                commits: 0,
                aborts: 0,
            })),
        }
    }

    /// Ultrawide + wide modules with realistic format tables.
    pub fn iphone() -> Self {
        Self::new(vec![
            LensProfile::new(
                DeviceInfo::new(LensIdentity::UltraWide, "Back Ultra Wide Camera")
                    .with_distortion_correction(true)
                    .with_center_stage(true),
                fixtures::ultrawide_formats(),
            ),
            LensProfile::new(
                DeviceInfo::new(LensIdentity::Wide, "Back Wide Camera")
                    .with_distortion_correction(false),
                fixtures::wide_formats(),
            ),
        ])
    }

    pub fn with_faults(self, faults: FaultPlan) -> Self {
        lock(&self.state).faults = faults;
        self
    }

    pub fn handle(&self) -> SimulatedHandle {
        SimulatedHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl SimulatedHandle {
    pub fn set_faults(&self, faults: FaultPlan) {
        lock(&self.state).faults = faults;
    }

    pub fn update_faults(&self, update: impl FnOnce(&mut FaultPlan)) {
        update(&mut lock(&self.state).faults);
    }

    /// Replace the format table of a lens, e.g. after a firmware mode change.
    pub fn set_formats(&self, lens: LensIdentity, formats: Vec<CaptureFormat>) {
        let mut state = lock(&self.state);
        if let Some(profile) = state.profiles.iter_mut().find(|p| p.info.lens == lens) {
            profile.formats = formats;
        }
    }

    pub fn remove_lens(&self, lens: LensIdentity) {
        lock(&self.state).profiles.retain(|p| p.info.lens != lens);
    }

    /// Change committed zoom outside of any transaction, as a framework call
    /// might.
    pub fn drift_zoom(&self, zoom: f64) {
        lock(&self.state).committed.zoom = zoom;
    }

    pub fn drift_center_stage(&self, enabled: bool) {
        lock(&self.state).committed.center_stage = enabled;
    }

    pub fn drift_stabilization(&self, mode: StabilizationMode) {
        lock(&self.state).committed.stabilization = mode;
    }

    pub fn set_microphone(&self, name: impl Into<String>) {
        lock(&self.state).microphone = name.into();
    }

    pub fn committed_format(&self) -> Option<CaptureFormat> {
        lock(&self.state).committed.format.clone()
    }

    pub fn committed_input(&self) -> Option<LensIdentity> {
        lock(&self.state).committed.input
    }

    pub fn live_readings(&self) -> LiveReadings {
        readings(&lock(&self.state))
    }

    pub fn exposure(&self) -> Option<PresetSettings> {
        lock(&self.state).exposure.clone()
    }

    pub fn transaction_counts(&self) -> (u64, u64) {
        let state = lock(&self.state);
        (state.commits, state.aborts)
    }

    pub fn is_recording(&self) -> bool {
        lock(&self.state).recording.is_some()
    }
}

fn readings(state: &SimState) -> LiveReadings {
    let running = state.ready_at.is_some_and(|at| Instant::now() >= at);
    let hw = &state.committed;
    LiveReadings {
        active_lens: hw.input,
        min_frame_duration: hw
            .frame_rate
            .filter(|rate| *rate > 0.0 && running)
            .map(|rate| Duration::from_secs_f64(1.0 / rate)),
        stabilization_mode: hw.stabilization,
        zoom_factor: hw.zoom,
        distortion_correction_enabled: hw.distortion_correction,
        center_stage_active: hw.center_stage,
        session_preset: hw.preset,
    }
}

impl SessionBackend for SimulatedBackend {
    fn has_device(&self, lens: LensIdentity) -> bool {
        lock(&self.state).profile(lens).is_ok()
    }

    fn device_info(&self, lens: LensIdentity) -> Result<DeviceInfo, CaptureError> {
        lock(&self.state).profile(lens).map(|p| p.info.clone())
    }

    fn formats(&self, lens: LensIdentity) -> Result<Vec<CaptureFormat>, CaptureError> {
        lock(&self.state).profile(lens).map(|p| p.formats.clone())
    }

    fn begin_configuration(&mut self) {
        let mut state = lock(&self.state);
        let snapshot = state.committed.clone();
        state.staged = Some(snapshot);
    }

    fn commit_configuration(&mut self) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        if state.faults.fail_commit {
            state.staged = None;
            state.aborts += 1;
            return Err(CaptureError::ConfigurationFailed(
                "session rejected the configuration".to_string(),
            ));
        }
        let staged = state.staged.take().ok_or_else(|| {
            CaptureError::ConfigurationFailed("commit without begin".to_string())
        })?;
        state.committed = staged;
        state.commits += 1;
        Ok(())
    }

    fn abort_configuration(&mut self) {
        let mut state = lock(&self.state);
        if state.staged.take().is_some() {
            state.aborts += 1;
        }
    }

    fn attach_input(&mut self, lens: LensIdentity) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        state.profile(lens)?;
        if state.faults.fail_input_attach {
            return Err(CaptureError::InputAttachFailed(format!(
                "session cannot add {} input",
                lens
            )));
        }
        let staged = state.staged_mut()?;
        if let Some(current) = staged.input {
            return Err(CaptureError::InputAttachFailed(format!(
                "{} input already attached",
                current
            )));
        }
        staged.input = Some(lens);
        // A new device comes up with its own defaults.
        staged.zoom = 1.0;
        staged.center_stage = false;
        staged.format = None;
        staged.frame_rate = None;
        Ok(())
    }

    fn detach_input(&mut self) {
        if let Ok(staged) = lock(&self.state).staged_mut() {
            staged.input = None;
        }
    }

    fn attach_movie_output(&mut self) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        if state.faults.fail_output_attach {
            return Err(CaptureError::OutputAttachFailed(
                "session cannot add movie file output".to_string(),
            ));
        }
        state.staged_mut()?.movie_output = true;
        Ok(())
    }

    fn attach_audio_input(&mut self) -> Result<AudioInput, CaptureError> {
        let mut state = lock(&self.state);
        if state.faults.fail_audio_attach {
            return Err(CaptureError::InputAttachFailed(
                "no audio input available".to_string(),
            ));
        }
        let audio = AudioInput {
            name: state.microphone.clone(),
        };
        state.staged_mut()?.audio = Some(audio.clone());
        Ok(audio)
    }

    fn set_session_preset(&mut self, preset: SessionPreset) -> Result<(), CaptureError> {
        lock(&self.state).staged_mut()?.preset = preset;
        Ok(())
    }

    fn set_active_format(
        &mut self,
        format: &CaptureFormat,
        frame_rate: f64,
    ) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        let staged = state.staged_mut()?;
        let lens = staged.input.ok_or_else(|| {
            CaptureError::ConfigurationFailed("no input to apply a format to".to_string())
        })?;
        let known = state
            .profile(lens)?
            .formats
            .iter()
            .any(|f| f == format);
        if !known {
            return Err(CaptureError::NoSuitableFormat(format!(
                "{} is not offered by the {} lens",
                format.resolution_label(),
                lens
            )));
        }
        let staged = state.staged_mut()?;
        staged.format = Some(format.clone());
        staged.frame_rate = Some(frame_rate);
        Ok(())
    }

    fn set_distortion_correction(&mut self, enabled: bool) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        let lens = state.staged_mut()?.input;
        if let Some(lens) = lens {
            if !state.profile(lens)?.info.supports_distortion_correction {
                return Err(CaptureError::ConfigurationFailed(format!(
                    "{} lens has no distortion correction",
                    lens
                )));
            }
        }
        state.staged_mut()?.distortion_correction = enabled;
        Ok(())
    }

    fn set_stabilization(&mut self, mode: StabilizationMode) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        if state.faults.stabilization_stuck {
            log::debug!("Ignoring stabilization change to {}", mode);
            return Ok(());
        }
        state.staged_mut()?.stabilization = mode;
        Ok(())
    }

    fn set_zoom_factor(&mut self, zoom: f64) -> Result<(), CaptureError> {
        if zoom < 1.0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "zoom factor {} below minimum 1.0",
                zoom
            )));
        }
        lock(&self.state).staged_mut()?.zoom = zoom;
        Ok(())
    }

    fn set_center_stage(&mut self, enabled: bool) -> Result<(), CaptureError> {
        lock(&self.state).staged_mut()?.center_stage = enabled;
        Ok(())
    }

    fn start_running(&mut self) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        if state.committed.input.is_none() {
            return Err(CaptureError::DeviceUnavailable(
                "session has no input".to_string(),
            ));
        }
        if state.faults.never_runs {
            // Accepted, but the hardware never reports active.
            return Ok(());
        }
        state.ready_at = Some(Instant::now() + state.faults.spin_up);
        Ok(())
    }

    fn is_running(&self) -> bool {
        lock(&self.state)
            .ready_at
            .is_some_and(|at| Instant::now() >= at)
    }

    fn stop_running(&mut self) {
        lock(&self.state).ready_at = None;
    }

    fn live_readings(&self) -> LiveReadings {
        readings(&lock(&self.state))
    }

    fn apply_exposure(&mut self, settings: &PresetSettings) -> Result<(), CaptureError> {
        lock(&self.state).exposure = Some(settings.clone());
        Ok(())
    }

    fn audio_input(&self) -> Option<AudioInput> {
        lock(&self.state).committed.audio.clone()
    }

    fn start_recording(
        &mut self,
        output: &Path,
        events: RecordingEventSender,
    ) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        if state.recording.is_some() {
            return Err(CaptureError::RecordingInProgress);
        }
        if !state.committed.movie_output {
            return Err(CaptureError::RecordingFailed(
                "no movie output attached".to_string(),
            ));
        }
        if state.faults.fail_recording_start {
            return Err(CaptureError::RecordingFailed(
                "movie output refused to start".to_string(),
            ));
        }
        // The file exists as soon as recording begins.
        std::fs::write(output, b"\x00\x00\x00\x14ftypqt  ").map_err(|e| {
            CaptureError::RecordingFailed(format!("cannot create {:?}: {}", output, e))
        })?;
        state.recording = Some(ActiveRecording {
            output: output.to_path_buf(),
            events,
        });
        Ok(())
    }

    fn stop_recording(&mut self) -> Result<(), CaptureError> {
        let mut state = lock(&self.state);
        let recording = state.recording.take().ok_or_else(|| {
            CaptureError::InvalidState("no recording in progress".to_string())
        })?;
        let event = if state.faults.fail_recording {
            RecordingEvent::Failed {
                output: recording.output,
                reason: "media services were reset".to_string(),
            }
        } else {
            RecordingEvent::Finished {
                output: recording.output,
            }
        };
        if recording.events.send(event).is_err() {
            log::warn!("Recording finished but nobody is listening for the event");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording_channel;

    #[test]
    fn test_staged_changes_invisible_until_commit() {
        let mut backend = SimulatedBackend::iphone();
        let handle = backend.handle();

        backend.begin_configuration();
        backend.attach_input(LensIdentity::UltraWide).unwrap();
        assert_eq!(handle.committed_input(), None);

        backend.commit_configuration().unwrap();
        assert_eq!(handle.committed_input(), Some(LensIdentity::UltraWide));
    }

    #[test]
    fn test_abort_discards_staged_changes() {
        let mut backend = SimulatedBackend::iphone();
        let handle = backend.handle();

        backend.begin_configuration();
        backend.attach_input(LensIdentity::Wide).unwrap();
        backend.abort_configuration();

        assert_eq!(handle.committed_input(), None);
        assert_eq!(handle.transaction_counts(), (0, 1));
    }

    #[test]
    fn test_mutation_outside_transaction_is_rejected() {
        let mut backend = SimulatedBackend::iphone();
        assert!(matches!(
            backend.set_zoom_factor(2.0),
            Err(CaptureError::ConfigurationFailed(_))
        ));
    }

    #[test]
    fn test_missing_lens_is_device_unavailable() {
        let backend = SimulatedBackend::iphone();
        backend.handle().remove_lens(LensIdentity::Wide);
        assert!(!backend.has_device(LensIdentity::Wide));
        assert!(matches!(
            backend.formats(LensIdentity::Wide),
            Err(CaptureError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_recording_reports_completion_once() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("clip.mov");
        let mut backend = SimulatedBackend::iphone();

        backend.begin_configuration();
        backend.attach_input(LensIdentity::UltraWide).unwrap();
        backend.attach_movie_output().unwrap();
        backend.commit_configuration().unwrap();

        let (tx, rx) = recording_channel();
        backend.start_recording(&output, tx).unwrap();
        assert!(output.exists());
        backend.stop_recording().unwrap();

        assert_eq!(rx.try_recv().unwrap(), RecordingEvent::Finished { output });
        assert!(rx.try_recv().is_err());
    }
}
