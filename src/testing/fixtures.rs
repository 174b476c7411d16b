//! Format tables for the simulated lenses.
//!
//! Ordering matters: selection falls back to device order, so these lists
//! keep the order the hardware reports them in.

use crate::types::{CaptureFormat, FrameRateRange};

fn format(width: u32, height: u32, fov: f64, max_fps: f64) -> CaptureFormat {
    CaptureFormat::new(width, height, fov, max_fps)
}

/// Ultrawide module. The binned 1080p mode reads out the full sensor width,
/// so it reports the widest FOV of the 16:9 formats.
pub fn ultrawide_formats() -> Vec<CaptureFormat> {
    vec![
        format(640, 480, 108.4, 30.0),
        format(1280, 720, 107.6, 60.0),
        format(1920, 1080, 107.6, 60.0),
        format(1920, 1080, 109.1, 30.0),
        format(1920, 1440, 108.4, 30.0),
        format(3840, 2160, 106.2, 30.0),
        format(3840, 2160, 106.2, 60.0),
        format(4032, 3024, 108.4, 30.0),
    ]
}

pub fn wide_formats() -> Vec<CaptureFormat> {
    vec![
        format(1280, 720, 69.0, 60.0),
        format(1920, 1080, 69.0, 60.0),
        format(1920, 1080, 69.0, 240.0).with_frame_rate_ranges(vec![
            FrameRateRange::new(1.0, 120.0),
            FrameRateRange::new(120.0, 240.0),
        ]),
        format(1920, 1440, 73.4, 30.0),
        format(3840, 2160, 67.8, 30.0),
        format(4032, 3024, 73.4, 30.0),
    ]
}

/// Two-format catalog where resolution and FOV pull in opposite directions.
pub fn scenario_catalog() -> Vec<CaptureFormat> {
    vec![
        CaptureFormat::new(3840, 2160, 70.0, 30.0)
            .with_frame_rate_ranges(vec![FrameRateRange::new(0.0, 30.0)]),
        CaptureFormat::new(1920, 1080, 95.0, 60.0)
            .with_frame_rate_ranges(vec![FrameRateRange::new(0.0, 60.0)]),
    ]
}
