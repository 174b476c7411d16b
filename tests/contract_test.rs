//! Contract tests: each controller path must actually evaluate the
//! invariants it is responsible for.
//!
//! The invariant log is per thread, and the controller runs on the test
//! thread here, so every check made by a call below is visible.

use pitchcam::invariant_ppt::{check_count, clear_invariant_log, contract_test, invariants};
use pitchcam::platform::{recording_channel, SimulatedBackend};
use pitchcam::session::{CaptureSessionController, ControllerSettings, ReconfigureRequest};
use pitchcam::types::{AspectRatioTarget, FovMode, LensIdentity, StabilizationMode};
use std::time::Duration;

fn running() -> (
    CaptureSessionController<SimulatedBackend>,
    pitchcam::platform::SimulatedHandle,
) {
    let backend = SimulatedBackend::iphone();
    let handle = backend.handle();
    let mut controller = CaptureSessionController::new(
        backend,
        ControllerSettings {
            start_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(1),
            ..ControllerSettings::default()
        },
    );
    controller.setup().unwrap();
    controller.start().unwrap();
    (controller, handle)
}

#[test]
fn contract_setup_checks_configuration_invariants() {
    clear_invariant_log();
    let (_controller, _handle) = running();

    contract_test(
        "setup",
        &[invariants::STABILIZATION_OFF, invariants::SINGLE_LENS_INPUT],
    );
}

#[test]
fn contract_maximized_reconfigure_checks_cropping() {
    let (mut controller, _handle) = running();
    clear_invariant_log();

    controller
        .reconfigure(ReconfigureRequest {
            fov_mode: Some(FovMode::Maximized),
            aspect: Some(AspectRatioTarget::Classic4x3),
            ..ReconfigureRequest::default()
        })
        .unwrap();

    contract_test(
        "maximized reconfigure",
        &[
            invariants::STABILIZATION_OFF,
            invariants::SINGLE_LENS_INPUT,
            invariants::MAXIMIZED_ZOOM_PINNED,
            invariants::MAXIMIZED_GDC_OFF,
        ],
    );
}

#[test]
fn contract_standard_reconfigure_skips_maximized_checks() {
    let (mut controller, _handle) = running();
    clear_invariant_log();

    controller.select_lens(LensIdentity::Wide).unwrap();

    contract_test(
        "lens switch",
        &[invariants::STABILIZATION_OFF, invariants::SINGLE_LENS_INPUT],
    );
    assert_eq!(check_count(invariants::MAXIMIZED_ZOOM_PINNED), 0);
}

#[test]
fn contract_recording_start_reasserts_after_drift() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, handle) = running();
    controller.set_fov_mode(FovMode::Maximized).unwrap();
    handle.drift_stabilization(StabilizationMode::Cinematic);
    handle.drift_zoom(2.0);
    clear_invariant_log();

    let (tx, _rx) = recording_channel();
    let config = controller
        .begin_recording(&dir.path().join("clip.mov"), tx)
        .unwrap();

    contract_test(
        "pre-recording hardening",
        &[
            invariants::STABILIZATION_OFF,
            invariants::MAXIMIZED_ZOOM_PINNED,
        ],
    );
    assert!(config.stabilization_off);
    assert_eq!(config.zoom_factor, 1.0);
    assert_eq!(handle.live_readings().zoom_factor, 1.0);
}

#[test]
fn contract_rejected_reconfigure_checks_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (mut controller, _handle) = running();
    let (tx, _rx) = recording_channel();
    controller
        .begin_recording(&dir.path().join("clip.mov"), tx)
        .unwrap();
    clear_invariant_log();

    assert!(controller.set_aspect_ratio(AspectRatioTarget::Classic4x3).is_err());

    assert_eq!(check_count(invariants::STABILIZATION_OFF), 0);
}
