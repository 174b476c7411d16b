//! Begin/commit guard around backend configuration.

use crate::assert_invariant;
use crate::errors::CaptureError;
use crate::invariant_ppt::invariants;
use crate::platform::{AudioInput, SessionBackend};
use crate::types::{CaptureFormat, LensIdentity, SessionPreset, StabilizationMode};

/// An open configuration transaction.
///
/// Mutations are staged on the backend and become visible together on
/// [`commit`](Self::commit). Dropping the guard without committing aborts
/// the transaction, so an early `?` return never leaves staged changes
/// behind.
///
/// Every commit pins stabilization off first; callers cannot opt out.
pub struct ConfigurationTransaction<'a, B: SessionBackend + ?Sized> {
    backend: &'a mut B,
    finished: bool,
    staged: Vec<&'static str>,
    inputs_attached: usize,
    stabilization: Option<StabilizationMode>,
}

impl<'a, B: SessionBackend + ?Sized> ConfigurationTransaction<'a, B> {
    pub fn begin(backend: &'a mut B) -> Self {
        backend.begin_configuration();
        Self {
            backend,
            finished: false,
            staged: Vec::new(),
            inputs_attached: 0,
            stabilization: None,
        }
    }

    /// Read-only access for decisions taken mid-transaction.
    pub fn backend(&self) -> &B {
        self.backend
    }

    /// Replace the lens input. A brief frame gap is expected.
    pub fn swap_input(
        &mut self,
        from: Option<LensIdentity>,
        to: LensIdentity,
    ) -> Result<(), CaptureError> {
        if from == Some(to) {
            return Ok(());
        }
        if from.is_some() {
            self.backend.detach_input();
        }
        self.backend.attach_input(to)?;
        self.inputs_attached += 1;
        self.staged.push("input");
        Ok(())
    }

    pub fn attach_movie_output(&mut self) -> Result<(), CaptureError> {
        self.backend.attach_movie_output()?;
        self.staged.push("movie output");
        Ok(())
    }

    pub fn attach_audio_input(&mut self) -> Result<AudioInput, CaptureError> {
        let audio = self.backend.attach_audio_input()?;
        self.staged.push("audio input");
        Ok(audio)
    }

    pub fn set_session_preset(&mut self, preset: SessionPreset) -> Result<(), CaptureError> {
        self.backend.set_session_preset(preset)?;
        self.staged.push("session preset");
        Ok(())
    }

    pub fn set_active_format(
        &mut self,
        format: &CaptureFormat,
        frame_rate: f64,
    ) -> Result<(), CaptureError> {
        self.backend.set_active_format(format, frame_rate)?;
        self.staged.push("active format");
        Ok(())
    }

    pub fn set_distortion_correction(&mut self, enabled: bool) -> Result<(), CaptureError> {
        self.backend.set_distortion_correction(enabled)?;
        self.staged.push("distortion correction");
        Ok(())
    }

    pub fn set_zoom_factor(&mut self, zoom: f64) -> Result<(), CaptureError> {
        self.backend.set_zoom_factor(zoom)?;
        self.staged.push("zoom");
        Ok(())
    }

    pub fn set_center_stage(&mut self, enabled: bool) -> Result<(), CaptureError> {
        self.backend.set_center_stage(enabled)?;
        self.staged.push("center stage");
        Ok(())
    }

    /// Pin stabilization off and commit everything staged.
    ///
    /// What the hardware reports afterwards is not checked here; a device
    /// may keep a different mode when Off is unsupported.
    pub fn commit(mut self) -> Result<(), CaptureError> {
        self.backend.set_stabilization(StabilizationMode::Off)?;
        self.stabilization = Some(StabilizationMode::Off);
        assert_invariant!(
            self.stabilization == Some(StabilizationMode::Off),
            invariants::STABILIZATION_OFF,
            "commit"
        );
        assert_invariant!(
            self.inputs_attached <= 1,
            invariants::SINGLE_LENS_INPUT,
            "commit"
        );
        self.backend.commit_configuration()?;
        self.finished = true;
        log::debug!("Committed configuration: {}", self.staged.join(", "));
        Ok(())
    }
}

impl<B: SessionBackend + ?Sized> Drop for ConfigurationTransaction<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!(
                "Aborting configuration transaction (staged: {})",
                if self.staged.is_empty() {
                    "nothing".to_string()
                } else {
                    self.staged.join(", ")
                }
            );
            self.backend.abort_configuration();
        }
    }
}
