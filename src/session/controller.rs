//! Capture session lifecycle and transactional reconfiguration.
//!
//! The controller is the single owner of the hardware backend. Every
//! configuration change is planned first (catalog query, format selection,
//! distortion policy) and only then applied inside one
//! [`ConfigurationTransaction`], so a planning failure never touches the
//! hardware and an apply failure is rolled back by the guard.

use super::state::{ActiveConfiguration, ReconfigureRequest, SessionState};
use super::transaction::ConfigurationTransaction;
use crate::assert_invariant;
use crate::config::PitchCamConfig;
use crate::diagnostics::{build_snapshot, DebugSnapshot};
use crate::distortion::{
    disable_all_cropping_features, CorrectionState, DistortionPolicy, UNCROPPED_ZOOM,
};
use crate::errors::CaptureError;
use crate::exposure::PresetSettings;
use crate::format::{select_format, FormatCatalog, FormatSelection, SelectionCriteria};
use crate::invariant_ppt::invariants;
use crate::platform::{AudioInput, RecordingEventSender, SessionBackend};
use crate::types::{
    AspectRatioTarget, FovMode, LensIdentity, SessionPreset, StabilizationMode,
};
use std::path::Path;
use std::time::{Duration, Instant};

/// Controller tuning, usually derived from [`PitchCamConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSettings {
    pub target_frame_rate: f64,
    pub initial_lens: LensIdentity,
    pub initial_aspect: AspectRatioTarget,
    pub initial_fov_mode: FovMode,
    pub aspect_tolerance: f64,
    pub start_timeout: Duration,
    pub poll_interval: Duration,
    pub audio_enabled: bool,
}

impl From<&PitchCamConfig> for ControllerSettings {
    fn from(config: &PitchCamConfig) -> Self {
        Self {
            target_frame_rate: config.capture.target_frame_rate,
            initial_lens: config.capture.default_lens,
            initial_aspect: config.capture.default_aspect,
            initial_fov_mode: config.capture.default_fov_mode,
            aspect_tolerance: config.capture.aspect_tolerance,
            start_timeout: config.session.start_timeout(),
            poll_interval: config.session.poll_interval(),
            audio_enabled: config.recording.audio_enabled,
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&PitchCamConfig::default())
    }
}

/// Everything decided before a transaction opens.
#[derive(Debug, Clone)]
struct ConfigurationPlan {
    lens: LensIdentity,
    fov_mode: FovMode,
    aspect: AspectRatioTarget,
    selection: FormatSelection,
    correction: CorrectionState,
    preset: SessionPreset,
}

pub struct CaptureSessionController<B: SessionBackend> {
    backend: B,
    settings: ControllerSettings,
    state: SessionState,
    active: Option<ActiveConfiguration>,
    audio: Option<AudioInput>,
    exposure: Option<PresetSettings>,
    recording: bool,
}

impl<B: SessionBackend> CaptureSessionController<B> {
    pub fn new(backend: B, settings: ControllerSettings) -> Self {
        Self {
            backend,
            settings,
            state: SessionState::Idle,
            active: None,
            audio: None,
            exposure: None,
            recording: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn active_configuration(&self) -> Option<&ActiveConfiguration> {
        self.active.as_ref()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn audio_input(&self) -> Option<&AudioInput> {
        self.audio.as_ref()
    }

    pub fn exposure(&self) -> Option<&PresetSettings> {
        self.exposure.as_ref()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Diagnostic view of the committed configuration, if any.
    pub fn snapshot(&self) -> Option<DebugSnapshot> {
        self.active
            .as_ref()
            .map(|config| build_snapshot(config, &self.backend.live_readings()))
    }

    /// Idle -> Configuring: acquire the initial lens, attach outputs and
    /// commit the initial format in a single transaction.
    pub fn setup(&mut self) -> Result<(), CaptureError> {
        if self.state != SessionState::Idle {
            return Err(CaptureError::InvalidState(format!(
                "setup requires an idle session (currently {})",
                self.state
            )));
        }
        self.state = SessionState::Configuring;
        log::info!("Configuring capture session");

        match self.configure_initial() {
            Ok(config) => {
                self.active = Some(config);
                Ok(())
            }
            Err(e) => {
                log::warn!("Session setup failed: {}", e);
                self.state = SessionState::Idle;
                Err(e)
            }
        }
    }

    fn configure_initial(&mut self) -> Result<ActiveConfiguration, CaptureError> {
        let plan = self.plan(
            self.settings.initial_lens,
            self.settings.initial_fov_mode,
            self.settings.initial_aspect,
        )?;
        let audio_enabled = self.settings.audio_enabled;

        let mut tx = ConfigurationTransaction::begin(&mut self.backend);
        tx.attach_movie_output()?;
        let audio = if audio_enabled {
            match tx.attach_audio_input() {
                Ok(audio) => Some(audio),
                Err(e) => {
                    log::warn!("Recording without audio: {}", e);
                    None
                }
            }
        } else {
            None
        };
        apply_plan(&mut tx, None, &plan)?;
        tx.commit()?;

        self.audio = audio;
        Ok(self.verify_committed(&plan, "setup"))
    }

    /// Configuring/Stopped -> Running once the hardware reports active.
    ///
    /// Fails with `DeviceUnavailable` when the session has not come up
    /// within the configured timeout.
    pub fn start(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Running => return Ok(()),
            SessionState::Configuring | SessionState::Stopped => {}
            other => {
                return Err(CaptureError::InvalidState(format!(
                    "cannot start a session that is {}",
                    other
                )))
            }
        }

        self.backend.start_running()?;

        let timeout = self.settings.start_timeout;
        let deadline = Instant::now() + timeout;
        while !self.backend.is_running() {
            if Instant::now() >= deadline {
                self.backend.stop_running();
                return Err(CaptureError::DeviceUnavailable(format!(
                    "session did not start within {}ms",
                    timeout.as_millis()
                )));
            }
            std::thread::sleep(self.settings.poll_interval);
        }

        self.state = SessionState::Running;
        if let Some(config) = self.active.as_mut() {
            config.session_running = true;
        }
        log::info!("Capture session running");
        Ok(())
    }

    /// Running -> Reconfiguring -> Running.
    ///
    /// On failure the previous configuration stays committed and the
    /// session keeps running; the error is returned for publication.
    pub fn reconfigure(&mut self, request: ReconfigureRequest) -> Result<(), CaptureError> {
        if self.recording {
            log::warn!("Reconfiguration rejected: recording in progress");
            return Err(CaptureError::RecordingInProgress);
        }
        if self.state != SessionState::Running {
            return Err(CaptureError::InvalidState(format!(
                "reconfiguration requires a running session (currently {})",
                self.state
            )));
        }
        let current = self.active.clone().ok_or_else(|| {
            CaptureError::InvalidState("running session has no configuration".to_string())
        })?;

        let lens = request.lens.unwrap_or(current.lens);
        let fov_mode = request.fov_mode.unwrap_or(current.fov_mode);
        let aspect = request.aspect.unwrap_or(current.aspect_target);

        self.state = SessionState::Reconfiguring;
        log::info!(
            "Reconfiguring: {} -> {}, {} -> {}, {} -> {}",
            current.lens,
            lens,
            current.fov_mode,
            fov_mode,
            current.aspect_target,
            aspect
        );

        let result = self.plan(lens, fov_mode, aspect).and_then(|plan| {
            let mut tx = ConfigurationTransaction::begin(&mut self.backend);
            apply_plan(&mut tx, Some(current.lens), &plan)?;
            tx.commit()?;
            Ok(plan)
        });
        self.state = SessionState::Running;

        match result {
            Ok(plan) => {
                let mut config = self.verify_committed(&plan, "reconfigure");
                config.session_running = true;
                self.active = Some(config);
                Ok(())
            }
            Err(e) => {
                log::warn!("Reconfiguration failed, keeping previous configuration: {}", e);
                Err(e)
            }
        }
    }

    pub fn select_lens(&mut self, lens: LensIdentity) -> Result<(), CaptureError> {
        self.reconfigure(ReconfigureRequest::lens(lens))
    }

    pub fn set_fov_mode(&mut self, mode: FovMode) -> Result<(), CaptureError> {
        self.reconfigure(ReconfigureRequest::fov_mode(mode))
    }

    pub fn set_aspect_ratio(&mut self, aspect: AspectRatioTarget) -> Result<(), CaptureError> {
        self.reconfigure(ReconfigureRequest::aspect(aspect))
    }

    /// Running -> Stopped. Safe to call repeatedly.
    pub fn stop(&mut self) -> Result<(), CaptureError> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => {
                log::debug!("Stop requested on a {} session", self.state);
                return Ok(());
            }
            _ => {}
        }
        if self.recording {
            self.request_stop_recording()?;
        }
        self.backend.stop_running();
        self.state = SessionState::Stopped;
        if let Some(config) = self.active.as_mut() {
            config.session_running = false;
        }
        log::info!("Capture session stopped");
        Ok(())
    }

    /// Push exposure settings to the hardware. Rejected while recording so
    /// the sidecar of the running recording stays accurate.
    pub fn apply_exposure(&mut self, settings: PresetSettings) -> Result<(), CaptureError> {
        if self.recording {
            return Err(CaptureError::RecordingInProgress);
        }
        settings.validate().map_err(CaptureError::ConfigurationFailed)?;
        self.backend.apply_exposure(&settings)?;
        log::info!("Applied exposure preset '{}'", settings.label);
        self.exposure = Some(settings);
        Ok(())
    }

    /// Start writing a movie to `output` and return the configuration in
    /// effect at that instant.
    ///
    /// Drift-prone hardware state is re-asserted first.
    pub fn begin_recording(
        &mut self,
        output: &Path,
        events: RecordingEventSender,
    ) -> Result<ActiveConfiguration, CaptureError> {
        if self.recording {
            return Err(CaptureError::RecordingInProgress);
        }
        if self.state != SessionState::Running {
            return Err(CaptureError::InvalidState(format!(
                "recording requires a running session (currently {})",
                self.state
            )));
        }

        self.reassert_capture_state()?;
        self.backend.start_recording(output, events)?;

        self.recording = true;
        let config = self.active.as_mut().ok_or_else(|| {
            CaptureError::InvalidState("running session has no configuration".to_string())
        })?;
        config.is_recording = true;
        log::info!("Recording started: {:?}", output);
        Ok(config.clone())
    }

    /// Ask the hardware to finish the recording. Completion arrives on the
    /// event channel passed to [`begin_recording`](Self::begin_recording).
    pub fn request_stop_recording(&mut self) -> Result<(), CaptureError> {
        if !self.recording {
            return Err(CaptureError::InvalidState(
                "no recording in progress".to_string(),
            ));
        }
        self.backend.stop_recording()
    }

    /// Record that the hardware delivered its completion event.
    pub fn recording_finished(&mut self) {
        self.recording = false;
        if let Some(config) = self.active.as_mut() {
            config.is_recording = false;
        }
    }

    fn plan(
        &self,
        lens: LensIdentity,
        fov_mode: FovMode,
        aspect: AspectRatioTarget,
    ) -> Result<ConfigurationPlan, CaptureError> {
        let device = self.backend.device_info(lens)?;
        let catalog = FormatCatalog::query(&self.backend, lens)?;
        let criteria = SelectionCriteria::new(self.settings.target_frame_rate, aspect, fov_mode)
            .with_tolerance(self.settings.aspect_tolerance);

        let selection = select_format(&catalog, &criteria).ok_or_else(|| {
            CaptureError::NoSuitableFormat(format!(
                "{} lens offers no format reaching {}fps",
                lens, self.settings.target_frame_rate
            ))
        })?;
        if selection.is_degraded() {
            log::warn!(
                "Degraded selection on {} lens: {}",
                lens,
                selection.describe_fallbacks().unwrap_or_default()
            );
        }

        Ok(ConfigurationPlan {
            lens,
            fov_mode,
            aspect,
            correction: DistortionPolicy::correction_state(
                fov_mode,
                device.supports_distortion_correction,
            ),
            preset: SessionPreset::for_mode(fov_mode),
            selection,
        })
    }

    /// Read back the committed hardware state and build the new active
    /// configuration from it.
    ///
    /// Live values are what the hardware reports and can differ from what
    /// was staged when a setting is unsupported. Differences are logged and
    /// recorded, never fatal.
    fn verify_committed(&self, plan: &ConfigurationPlan, context: &str) -> ActiveConfiguration {
        let live = self.backend.live_readings();

        if live.stabilization_mode != StabilizationMode::Off {
            log::warn!(
                "[{}] stabilization reads {} after commit, expected off",
                context,
                live.stabilization_mode
            );
        }
        if live.active_lens != Some(plan.lens) {
            log::warn!(
                "[{}] active lens reads {:?} after commit, expected {}",
                context,
                live.active_lens,
                plan.lens
            );
        }
        if plan.fov_mode.is_maximized() {
            if live.zoom_factor != UNCROPPED_ZOOM {
                log::warn!(
                    "[{}] zoom reads {} in maximized FOV, expected {}",
                    context,
                    live.zoom_factor,
                    UNCROPPED_ZOOM
                );
            }
            if plan.correction.applied && live.distortion_correction_enabled {
                log::warn!("[{}] distortion correction still on in maximized FOV", context);
            }
        }

        ActiveConfiguration {
            lens: plan.lens,
            fov_mode: plan.fov_mode,
            aspect_target: plan.aspect,
            selected_format: plan.selection.format.clone(),
            frame_rate: plan.selection.frame_rate,
            correction: plan.correction,
            stabilization_off: live.stabilization_mode == StabilizationMode::Off,
            zoom_factor: live.zoom_factor,
            center_stage_active: live.center_stage_active,
            session_preset: plan.preset,
            selection_fallback: plan.selection.describe_fallbacks(),
            session_running: self.state == SessionState::Running,
            is_recording: self.recording,
        }
    }

    /// Correct stabilization, zoom or Center Stage if something outside
    /// the engine changed them since the last commit.
    fn reassert_capture_state(&mut self) -> Result<(), CaptureError> {
        let Some(config) = self.active.as_ref() else {
            return Ok(());
        };
        let maximized = config.fov_mode.is_maximized();
        let live = self.backend.live_readings();
        let drifted = live.stabilization_mode != StabilizationMode::Off
            || (maximized && (live.zoom_factor != 1.0 || live.center_stage_active));
        if !drifted {
            return Ok(());
        }

        log::warn!(
            "Capture state drifted before recording \
             (stabilization {}, zoom {}, center stage {}), re-asserting",
            live.stabilization_mode,
            live.zoom_factor,
            live.center_stage_active
        );
        let mut tx = ConfigurationTransaction::begin(&mut self.backend);
        if maximized {
            pin_uncropped(&mut tx)?;
        }
        tx.commit()?;

        let live = self.backend.live_readings();
        if live.stabilization_mode != StabilizationMode::Off
            || (maximized && live.zoom_factor != UNCROPPED_ZOOM)
        {
            log::warn!(
                "Hardware kept stabilization {} and zoom {} after re-assertion, recording anyway",
                live.stabilization_mode,
                live.zoom_factor
            );
        }
        if let Some(config) = self.active.as_mut() {
            config.stabilization_off = live.stabilization_mode == StabilizationMode::Off;
            config.zoom_factor = live.zoom_factor;
            config.center_stage_active = live.center_stage_active;
        }
        Ok(())
    }
}

fn apply_plan<B: SessionBackend + ?Sized>(
    tx: &mut ConfigurationTransaction<'_, B>,
    current_lens: Option<LensIdentity>,
    plan: &ConfigurationPlan,
) -> Result<(), CaptureError> {
    tx.swap_input(current_lens, plan.lens)?;
    tx.set_session_preset(plan.preset)?;
    tx.set_active_format(&plan.selection.format, plan.selection.frame_rate)?;
    DistortionPolicy::apply(tx, plan.correction)?;
    if plan.fov_mode.is_maximized() {
        assert_invariant!(
            !plan.correction.enabled,
            invariants::MAXIMIZED_GDC_OFF,
            "apply"
        );
        pin_uncropped(tx)?;
    }
    Ok(())
}

/// Stage the maximized-FOV anti-crop settings.
fn pin_uncropped<B: SessionBackend + ?Sized>(
    tx: &mut ConfigurationTransaction<'_, B>,
) -> Result<(), CaptureError> {
    let outcome = disable_all_cropping_features(tx)?;
    assert_invariant!(
        outcome.zoom_factor == UNCROPPED_ZOOM,
        invariants::MAXIMIZED_ZOOM_PINNED,
        "apply"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{recording_channel, FaultPlan, RecordingEvent, SimulatedBackend};

    fn settings() -> ControllerSettings {
        ControllerSettings {
            start_timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(1),
            ..ControllerSettings::default()
        }
    }

    fn running() -> (CaptureSessionController<SimulatedBackend>, crate::platform::SimulatedHandle) {
        let backend = SimulatedBackend::iphone();
        let handle = backend.handle();
        let mut controller = CaptureSessionController::new(backend, settings());
        controller.setup().unwrap();
        controller.start().unwrap();
        (controller, handle)
    }

    #[test]
    fn test_setup_selects_uhd_standard_on_ultrawide() {
        let (controller, handle) = running();
        let config = controller.active_configuration().unwrap();

        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(config.lens, LensIdentity::UltraWide);
        assert_eq!(config.selected_format.width, 3840);
        assert!(config.gdc_enabled());
        assert!(config.stabilization_off);
        assert_eq!(handle.committed_input(), Some(LensIdentity::UltraWide));
        assert_eq!(
            controller.audio_input().map(|a| a.name.as_str()),
            Some("Built-In Microphone")
        );
    }

    #[test]
    fn test_setup_failure_returns_to_idle() {
        let backend = SimulatedBackend::iphone().with_faults(FaultPlan {
            fail_output_attach: true,
            ..FaultPlan::default()
        });
        let handle = backend.handle();
        let mut controller = CaptureSessionController::new(backend, settings());

        let err = controller.setup().unwrap_err();
        assert!(matches!(err, CaptureError::OutputAttachFailed(_)));
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.active_configuration().is_none());
        assert_eq!(handle.committed_input(), None);
    }

    #[test]
    fn test_audio_failure_is_not_fatal() {
        let backend = SimulatedBackend::iphone().with_faults(FaultPlan {
            fail_audio_attach: true,
            ..FaultPlan::default()
        });
        let mut controller = CaptureSessionController::new(backend, settings());
        controller.setup().unwrap();
        assert!(controller.audio_input().is_none());
    }

    #[test]
    fn test_start_timeout_is_device_unavailable() {
        let backend = SimulatedBackend::iphone().with_faults(FaultPlan {
            never_runs: true,
            ..FaultPlan::default()
        });
        let mut controller = CaptureSessionController::new(backend, settings());
        controller.setup().unwrap();

        let err = controller.start().unwrap_err();
        assert!(matches!(err, CaptureError::DeviceUnavailable(_)));
        assert_ne!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_maximized_pins_zoom_and_disables_gdc() {
        let (mut controller, handle) = running();
        handle.drift_zoom(1.8);
        handle.drift_center_stage(true);

        controller.set_fov_mode(FovMode::Maximized).unwrap();
        let config = controller.active_configuration().unwrap();
        assert_eq!(config.zoom_factor, 1.0);
        assert!(!config.center_stage_active);
        assert!(!config.gdc_enabled());
        assert_eq!(config.session_preset, SessionPreset::InputPriority);
        assert_eq!(config.selected_format.field_of_view, 109.1);
        assert!(!handle.live_readings().distortion_correction_enabled);
    }

    #[test]
    fn test_reconfigure_rejected_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, handle) = running();
        let (tx, _rx) = recording_channel();
        controller
            .begin_recording(&dir.path().join("clip.mov"), tx)
            .unwrap();

        let err = controller.select_lens(LensIdentity::Wide).unwrap_err();
        assert_eq!(err, CaptureError::RecordingInProgress);
        assert_eq!(
            controller.active_configuration().unwrap().lens,
            LensIdentity::UltraWide
        );
        assert_eq!(handle.committed_input(), Some(LensIdentity::UltraWide));
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_configuration() {
        let (mut controller, handle) = running();
        let before = controller.active_configuration().unwrap().clone();
        handle.set_formats(LensIdentity::Wide, Vec::new());

        let err = controller.select_lens(LensIdentity::Wide).unwrap_err();
        assert!(matches!(err, CaptureError::NoSuitableFormat(_)));
        assert_eq!(controller.state(), SessionState::Running);
        assert_eq!(controller.active_configuration(), Some(&before));
        assert_eq!(handle.committed_input(), Some(LensIdentity::UltraWide));
    }

    #[test]
    fn test_commit_failure_rolls_back_lens_swap() {
        let (mut controller, handle) = running();
        handle.update_faults(|f| f.fail_commit = true);

        assert!(controller.select_lens(LensIdentity::Wide).is_err());
        assert_eq!(handle.committed_input(), Some(LensIdentity::UltraWide));
        assert_eq!(
            controller.active_configuration().unwrap().lens,
            LensIdentity::UltraWide
        );
    }

    #[test]
    fn test_lens_switch_to_device_without_gdc() {
        let (mut controller, _handle) = running();
        controller.select_lens(LensIdentity::Wide).unwrap();
        let config = controller.active_configuration().unwrap();
        assert_eq!(config.lens, LensIdentity::Wide);
        assert!(!config.gdc_supported());
        assert_eq!(controller.snapshot().unwrap().gdc_label(), "N/A");
    }

    #[test]
    fn test_recording_reasserts_drifted_state() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, handle) = running();
        controller.set_fov_mode(FovMode::Maximized).unwrap();
        handle.drift_zoom(2.0);
        handle.drift_stabilization(StabilizationMode::Cinematic);

        let (tx, rx) = recording_channel();
        let config = controller
            .begin_recording(&dir.path().join("clip.mov"), tx)
            .unwrap();
        assert_eq!(config.zoom_factor, 1.0);
        assert!(config.is_recording);
        let live = handle.live_readings();
        assert_eq!(live.stabilization_mode, StabilizationMode::Off);
        assert_eq!(live.zoom_factor, 1.0);

        controller.request_stop_recording().unwrap();
        assert!(matches!(rx.try_recv(), Ok(RecordingEvent::Finished { .. })));
        controller.recording_finished();
        assert!(!controller.is_recording());
    }

    #[test]
    fn test_exposure_rejected_while_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (mut controller, handle) = running();
        controller
            .apply_exposure(crate::exposure::ShootingPreset::Floodlight.settings())
            .unwrap();
        assert_eq!(handle.exposure().unwrap().label, "floodlight");

        let (tx, _rx) = recording_channel();
        controller
            .begin_recording(&dir.path().join("clip.mov"), tx)
            .unwrap();
        let err = controller
            .apply_exposure(crate::exposure::ShootingPreset::Dusk.settings())
            .unwrap_err();
        assert_eq!(err, CaptureError::RecordingInProgress);
        assert_eq!(handle.exposure().unwrap().label, "floodlight");
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut controller, _handle) = running();
        controller.stop().unwrap();
        controller.stop().unwrap();
        assert_eq!(controller.state(), SessionState::Stopped);
        assert!(!controller.active_configuration().unwrap().session_running);

        controller.start().unwrap();
        assert_eq!(controller.state(), SessionState::Running);
    }

    #[test]
    fn test_reconfigure_before_start_is_invalid() {
        let mut controller = CaptureSessionController::new(SimulatedBackend::iphone(), settings());
        controller.setup().unwrap();
        assert!(matches!(
            controller.set_aspect_ratio(AspectRatioTarget::Classic4x3),
            Err(CaptureError::InvalidState(_))
        ));
    }
}
