//! Format selection
//!
//! Maximized mode: widest reported FOV wins, ties broken by pixel area.
//! Standard mode: first UHD format in device order that reaches the target
//! rate, else the first remaining candidate.
//!
//! Both modes first drop formats that cannot reach the target frame rate,
//! then narrow to the requested aspect ratio. When no format has the
//! requested ratio the aspect filter is skipped and the selection is marked
//! degraded.

use super::catalog::FormatCatalog;
use crate::types::{AspectRatioTarget, CaptureFormat, FovMode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Width/height ratio slack when matching an aspect target.
pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.05;

/// A preferred filter that matched nothing and was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionFallback {
    AspectRatioUnavailable,
    NoUhdCandidate,
}

impl fmt::Display for SelectionFallback {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SelectionFallback::AspectRatioUnavailable => {
                write!(f, "requested aspect ratio unavailable")
            }
            SelectionFallback::NoUhdCandidate => write!(f, "no 4K format at target rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionCriteria {
    pub min_frame_rate: f64,
    pub aspect: AspectRatioTarget,
    pub fov_mode: FovMode,
    pub aspect_tolerance: f64,
}

impl SelectionCriteria {
    pub fn new(min_frame_rate: f64, aspect: AspectRatioTarget, fov_mode: FovMode) -> Self {
        Self {
            min_frame_rate,
            aspect,
            fov_mode,
            aspect_tolerance: DEFAULT_ASPECT_TOLERANCE,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.aspect_tolerance = tolerance;
        self
    }
}

/// Outcome of a selection, including any preference that had to be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatSelection {
    pub format: CaptureFormat,
    pub frame_rate: f64,
    pub fallbacks: Vec<SelectionFallback>,
}

impl FormatSelection {
    pub fn is_degraded(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    pub fn describe_fallbacks(&self) -> Option<String> {
        if self.fallbacks.is_empty() {
            return None;
        }
        Some(
            self.fallbacks
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// Pick the best format for the given frame rate, aspect ratio and FOV mode.
///
/// Returns `None` only when no format can reach `min_frame_rate`.
pub fn select_best_format(
    catalog: &FormatCatalog,
    min_frame_rate: f64,
    aspect: AspectRatioTarget,
    fov_mode: FovMode,
) -> Option<CaptureFormat> {
    select_format(catalog, &SelectionCriteria::new(min_frame_rate, aspect, fov_mode))
        .map(|selection| selection.format)
}

pub fn select_format(
    catalog: &FormatCatalog,
    criteria: &SelectionCriteria,
) -> Option<FormatSelection> {
    let mut fallbacks = Vec::new();

    let rate_capable: Vec<&CaptureFormat> =
        catalog.supporting_frame_rate(criteria.min_frame_rate).collect();
    if rate_capable.is_empty() {
        log::warn!(
            "{} lens: no format reaches {}fps ({} formats offered)",
            catalog.lens(),
            criteria.min_frame_rate,
            catalog.len()
        );
        return None;
    }

    let aspect_matched: Vec<&CaptureFormat> = rate_capable
        .iter()
        .copied()
        .filter(|f| criteria.aspect.matches(f.width, f.height, criteria.aspect_tolerance))
        .collect();
    let candidates = if aspect_matched.is_empty() {
        log::warn!(
            "{} lens: no {} format at {}fps, ignoring aspect ratio",
            catalog.lens(),
            criteria.aspect,
            criteria.min_frame_rate
        );
        fallbacks.push(SelectionFallback::AspectRatioUnavailable);
        rate_capable
    } else {
        aspect_matched
    };

    let chosen = match criteria.fov_mode {
        FovMode::Maximized => widest(&candidates),
        FovMode::Standard => {
            let uhd = candidates.iter().copied().find(|f| {
                f.is_uhd() && f.supports_frame_rate(criteria.min_frame_rate)
            });
            if uhd.is_none() {
                log::info!(
                    "{} lens: no 4K format at {}fps, using best available",
                    catalog.lens(),
                    criteria.min_frame_rate
                );
                fallbacks.push(SelectionFallback::NoUhdCandidate);
            }
            uhd.or_else(|| candidates.first().copied())
        }
    }?;

    let frame_rate = chosen
        .range_for(criteria.min_frame_rate)
        .map(|range| range.effective_rate(criteria.min_frame_rate))
        .unwrap_or(criteria.min_frame_rate);

    log::info!(
        "{} lens, {} mode, {}: selected {} at {}fps",
        catalog.lens(),
        criteria.fov_mode,
        criteria.aspect,
        chosen,
        frame_rate
    );

    Some(FormatSelection {
        format: chosen.clone(),
        frame_rate,
        fallbacks,
    })
}

/// Descending FOV, then descending pixel area. Full ties keep device order.
fn by_coverage(a: &CaptureFormat, b: &CaptureFormat) -> Ordering {
    b.field_of_view
        .total_cmp(&a.field_of_view)
        .then_with(|| b.pixel_area().cmp(&a.pixel_area()))
}

fn widest<'a>(candidates: &[&'a CaptureFormat]) -> Option<&'a CaptureFormat> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|a, b| by_coverage(a, b));
    sorted.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::types::{FrameRateRange, LensIdentity};

    fn catalog(formats: Vec<CaptureFormat>) -> FormatCatalog {
        FormatCatalog::from_formats(LensIdentity::UltraWide, formats)
    }

    #[test]
    fn test_maximized_prefers_fov_over_resolution() {
        let selected = select_best_format(
            &catalog(fixtures::scenario_catalog()),
            30.0,
            AspectRatioTarget::Wide16x9,
            FovMode::Maximized,
        )
        .unwrap();
        assert_eq!((selected.width, selected.height), (1920, 1080));
        assert_eq!(selected.field_of_view, 95.0);
    }

    #[test]
    fn test_standard_prefers_uhd() {
        let selected = select_best_format(
            &catalog(fixtures::scenario_catalog()),
            30.0,
            AspectRatioTarget::Wide16x9,
            FovMode::Standard,
        )
        .unwrap();
        assert_eq!((selected.width, selected.height), (3840, 2160));
    }

    #[test]
    fn test_fov_tie_breaks_on_pixel_area() {
        let formats = vec![
            CaptureFormat::new(1920, 1440, 108.4, 30.0),
            CaptureFormat::new(4032, 3024, 108.4, 30.0),
            CaptureFormat::new(640, 480, 108.4, 30.0),
        ];
        let selected = select_best_format(
            &catalog(formats),
            30.0,
            AspectRatioTarget::Classic4x3,
            FovMode::Maximized,
        )
        .unwrap();
        assert_eq!((selected.width, selected.height), (4032, 3024));
    }

    #[test]
    fn test_frame_rate_floor_excludes_slow_formats() {
        // Only the 60fps 1080p format can reach 60.
        let selected = select_best_format(
            &catalog(fixtures::scenario_catalog()),
            60.0,
            AspectRatioTarget::Wide16x9,
            FovMode::Standard,
        )
        .unwrap();
        assert_eq!((selected.width, selected.height), (1920, 1080));
    }

    #[test]
    fn test_missing_aspect_ratio_degrades_instead_of_failing() {
        let criteria =
            SelectionCriteria::new(30.0, AspectRatioTarget::Classic4x3, FovMode::Maximized);
        let selection = select_format(&catalog(fixtures::scenario_catalog()), &criteria).unwrap();
        assert!(selection.is_degraded());
        assert_eq!(
            selection.fallbacks,
            vec![SelectionFallback::AspectRatioUnavailable]
        );
        assert_eq!(selection.format.field_of_view, 95.0);
    }

    #[test]
    fn test_standard_without_uhd_uses_device_order() {
        let formats = vec![
            CaptureFormat::new(1280, 720, 100.0, 60.0),
            CaptureFormat::new(1920, 1080, 90.0, 60.0),
        ];
        let criteria = SelectionCriteria::new(30.0, AspectRatioTarget::Wide16x9, FovMode::Standard);
        let selection = select_format(&catalog(formats), &criteria).unwrap();
        assert_eq!(selection.format.width, 1280);
        assert_eq!(selection.fallbacks, vec![SelectionFallback::NoUhdCandidate]);
        assert!(selection.describe_fallbacks().unwrap().contains("4K"));
    }

    #[test]
    fn test_standard_keeps_first_uhd_in_device_order() {
        let formats = vec![
            CaptureFormat::new(1920, 1080, 110.0, 60.0),
            CaptureFormat::new(3840, 2160, 100.0, 30.0),
            CaptureFormat::new(3840, 2160, 104.0, 60.0),
        ];
        let selected = select_best_format(
            &catalog(formats),
            30.0,
            AspectRatioTarget::Wide16x9,
            FovMode::Standard,
        )
        .unwrap();
        assert_eq!(selected.field_of_view, 100.0);
    }

    #[test]
    fn test_empty_catalog_selects_nothing() {
        let result = select_best_format(
            &catalog(Vec::new()),
            30.0,
            AspectRatioTarget::Wide16x9,
            FovMode::Maximized,
        );
        assert!(result.is_none());
    }

    #[test]
    fn test_effective_rate_respects_range_floor() {
        let formats = vec![CaptureFormat::new(1920, 1080, 90.0, 240.0)
            .with_frame_rate_ranges(vec![FrameRateRange::new(120.0, 240.0)])];
        let criteria =
            SelectionCriteria::new(30.0, AspectRatioTarget::Wide16x9, FovMode::Maximized);
        let selection = select_format(&catalog(formats), &criteria).unwrap();
        assert_eq!(selection.frame_rate, 120.0);
    }

    #[test]
    fn test_ultrawide_fixture_selections() {
        let catalog = catalog(fixtures::ultrawide_formats());

        let max_wide =
            select_best_format(&catalog, 30.0, AspectRatioTarget::Wide16x9, FovMode::Maximized)
                .unwrap();
        assert_eq!((max_wide.width, max_wide.field_of_view), (1920, 109.1));

        let max_classic =
            select_best_format(&catalog, 30.0, AspectRatioTarget::Classic4x3, FovMode::Maximized)
                .unwrap();
        assert_eq!((max_classic.width, max_classic.height), (4032, 3024));

        let std_wide =
            select_best_format(&catalog, 30.0, AspectRatioTarget::Wide16x9, FovMode::Standard)
                .unwrap();
        assert_eq!((std_wide.width, std_wide.max_frame_rate()), (3840, 30.0));
    }
}
