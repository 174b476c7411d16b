//! Core value types shared by the catalog, selector, controller and recorder.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::format::aspect::{self, AspectRatioClass};

/// Physical camera module. Each variant maps to exactly one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LensIdentity {
    UltraWide,
    Wide,
}

impl LensIdentity {
    pub fn all() -> [LensIdentity; 2] {
        [LensIdentity::UltraWide, LensIdentity::Wide]
    }

    /// Stable identifier used in sidecars, config files and the CLI.
    pub fn as_str(&self) -> &'static str {
        match self {
            LensIdentity::UltraWide => "ultraWide",
            LensIdentity::Wide => "wide",
        }
    }

    /// Human label for overlays.
    pub fn label(&self) -> &'static str {
        match self {
            LensIdentity::UltraWide => "Ultra Wide (0.5x)",
            LensIdentity::Wide => "Wide (1x)",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ultrawide" | "ultra-wide" | "ultra_wide" | "0.5x" => Some(LensIdentity::UltraWide),
            "wide" | "1x" => Some(LensIdentity::Wide),
            _ => None,
        }
    }
}

impl fmt::Display for LensIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the pipeline is tuned for image quality or for raw optical coverage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FovMode {
    Standard,
    Maximized,
}

impl FovMode {
    pub fn is_maximized(&self) -> bool {
        matches!(self, FovMode::Maximized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FovMode::Standard => "standard",
            FovMode::Maximized => "maximized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "std" => Some(FovMode::Standard),
            "maximized" | "max" | "maxfov" => Some(FovMode::Maximized),
            _ => None,
        }
    }
}

impl fmt::Display for FovMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested frame shape. Matched against formats with a ratio tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AspectRatioTarget {
    Wide16x9,
    Classic4x3,
}

impl AspectRatioTarget {
    /// Nominal width/height ratio.
    pub fn ratio(&self) -> f64 {
        match self {
            AspectRatioTarget::Wide16x9 => 16.0 / 9.0,
            AspectRatioTarget::Classic4x3 => 4.0 / 3.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatioTarget::Wide16x9 => "16:9",
            AspectRatioTarget::Classic4x3 => "4:3",
        }
    }

    /// True when `width / height` is within `tolerance` of the nominal ratio.
    pub fn matches(&self, width: u32, height: u32, tolerance: f64) -> bool {
        if height == 0 {
            return false;
        }
        let ratio = f64::from(width) / f64::from(height);
        (ratio - self.ratio()).abs() <= tolerance
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "16:9" | "16x9" | "wide16x9" => Some(AspectRatioTarget::Wide16x9),
            "4:3" | "4x3" | "classic4x3" => Some(AspectRatioTarget::Classic4x3),
            _ => None,
        }
    }
}

impl fmt::Display for AspectRatioTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Inclusive frame-rate range reported by the device for one format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRateRange {
    pub min: f64,
    pub max: f64,
}

impl FrameRateRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A range qualifies for a target rate when it can reach it. Rates below
    /// the target are not required.
    pub fn reaches(&self, rate: f64) -> bool {
        self.max >= rate
    }

    /// The rate actually programmed for a requested target.
    pub fn effective_rate(&self, target: f64) -> f64 {
        target.clamp(self.min, self.max)
    }
}

/// One discrete capture format as reported by a lens device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub field_of_view: f64,
    pub frame_rate_ranges: Vec<FrameRateRange>,
}

impl CaptureFormat {
    /// Create a format with a single `1..=max_fps` frame-rate range.
    pub fn new(width: u32, height: u32, field_of_view: f64, max_fps: f64) -> Self {
        Self {
            width,
            height,
            field_of_view,
            frame_rate_ranges: vec![FrameRateRange::new(1.0, max_fps)],
        }
    }

    pub fn with_frame_rate_ranges(mut self, ranges: Vec<FrameRateRange>) -> Self {
        self.frame_rate_ranges = ranges;
        self
    }

    pub fn pixel_area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        f64::from(self.width) / f64::from(self.height)
    }

    pub fn aspect_ratio_class(&self) -> AspectRatioClass {
        aspect::classify(self.width, self.height)
    }

    pub fn supports_frame_rate(&self, rate: f64) -> bool {
        self.frame_rate_ranges.iter().any(|r| r.reaches(rate))
    }

    /// First range that reaches `rate`, in device order.
    pub fn range_for(&self, rate: f64) -> Option<FrameRateRange> {
        self.frame_rate_ranges.iter().copied().find(|r| r.reaches(rate))
    }

    pub fn max_frame_rate(&self) -> f64 {
        self.frame_rate_ranges
            .iter()
            .map(|r| r.max)
            .fold(0.0, f64::max)
    }

    /// At least 3840x2160.
    pub fn is_uhd(&self) -> bool {
        self.width >= 3840 && self.height >= 2160
    }

    pub fn resolution_label(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

impl fmt::Display for CaptureFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} ({}) fov={:.1} max={:.0}fps",
            self.width,
            self.height,
            self.aspect_ratio_class(),
            self.field_of_view,
            self.max_frame_rate()
        )
    }
}

/// Video stabilization modes a connection can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StabilizationMode {
    Off,
    Standard,
    Cinematic,
    CinematicExtended,
    Auto,
}

impl StabilizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilizationMode::Off => "off",
            StabilizationMode::Standard => "standard",
            StabilizationMode::Cinematic => "cinematic",
            StabilizationMode::CinematicExtended => "cinematicExtended",
            StabilizationMode::Auto => "auto",
        }
    }
}

impl fmt::Display for StabilizationMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session-level preset. `InputPriority` means the active format chosen by
/// the engine is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPreset {
    High,
    InputPriority,
}

impl SessionPreset {
    pub fn for_mode(mode: FovMode) -> Self {
        match mode {
            FovMode::Standard => SessionPreset::High,
            FovMode::Maximized => SessionPreset::InputPriority,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPreset::High => "high",
            SessionPreset::InputPriority => "inputPriority",
        }
    }
}

impl fmt::Display for SessionPreset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
