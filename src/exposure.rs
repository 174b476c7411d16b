//! Shooting presets and metering zones.
//!
//! Each preset and zone is a plain variant; the settings and coordinates
//! they stand for live in exhaustive match tables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Point of interest in normalized frame coordinates, (0, 0) top-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// One cell of the 3x3 metering grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeteringZone {
    TopLeft,
    TopCenter,
    TopRight,
    CenterLeft,
    Center,
    CenterRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl MeteringZone {
    pub fn all() -> [MeteringZone; 9] {
        [
            MeteringZone::TopLeft,
            MeteringZone::TopCenter,
            MeteringZone::TopRight,
            MeteringZone::CenterLeft,
            MeteringZone::Center,
            MeteringZone::CenterRight,
            MeteringZone::BottomLeft,
            MeteringZone::BottomCenter,
            MeteringZone::BottomRight,
        ]
    }

    /// Centre of the zone's grid cell.
    pub fn point_of_interest(&self) -> NormalizedPoint {
        const NEAR: f64 = 1.0 / 6.0;
        const MID: f64 = 0.5;
        const FAR: f64 = 5.0 / 6.0;
        let (x, y) = match self {
            MeteringZone::TopLeft => (NEAR, NEAR),
            MeteringZone::TopCenter => (MID, NEAR),
            MeteringZone::TopRight => (FAR, NEAR),
            MeteringZone::CenterLeft => (NEAR, MID),
            MeteringZone::Center => (MID, MID),
            MeteringZone::CenterRight => (FAR, MID),
            MeteringZone::BottomLeft => (NEAR, FAR),
            MeteringZone::BottomCenter => (MID, FAR),
            MeteringZone::BottomRight => (FAR, FAR),
        };
        NormalizedPoint { x, y }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeteringZone::TopLeft => "topLeft",
            MeteringZone::TopCenter => "topCenter",
            MeteringZone::TopRight => "topRight",
            MeteringZone::CenterLeft => "centerLeft",
            MeteringZone::Center => "center",
            MeteringZone::CenterRight => "centerRight",
            MeteringZone::BottomLeft => "bottomLeft",
            MeteringZone::BottomCenter => "bottomCenter",
            MeteringZone::BottomRight => "bottomRight",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        MeteringZone::all()
            .into_iter()
            .find(|zone| zone.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for MeteringZone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lighting conditions on a pitch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShootingPreset {
    Daylight,
    Overcast,
    Floodlight,
    Dusk,
}

impl ShootingPreset {
    pub fn all() -> [ShootingPreset; 4] {
        [
            ShootingPreset::Daylight,
            ShootingPreset::Overcast,
            ShootingPreset::Floodlight,
            ShootingPreset::Dusk,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            ShootingPreset::Daylight => "daylight",
            ShootingPreset::Overcast => "overcast",
            ShootingPreset::Floodlight => "floodlight",
            ShootingPreset::Dusk => "dusk",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ShootingPreset::all()
            .into_iter()
            .find(|preset| preset.label().eq_ignore_ascii_case(s))
    }

    pub fn settings(&self) -> PresetSettings {
        // Floodlit pitches are metered low so the players under the lights
        // are not blown out by the dark stands.
        let (exposure_bias, iso, white_balance, metering_zone) = match self {
            ShootingPreset::Daylight => (-0.3, 50.0, 5600.0, MeteringZone::Center),
            ShootingPreset::Overcast => (0.3, 200.0, 6500.0, MeteringZone::Center),
            ShootingPreset::Floodlight => (-1.0, 800.0, 4000.0, MeteringZone::BottomCenter),
            ShootingPreset::Dusk => (0.7, 1600.0, 3800.0, MeteringZone::BottomCenter),
        };
        PresetSettings {
            label: self.label().to_string(),
            exposure_bias,
            iso,
            white_balance,
            metering_zone,
        }
    }
}

/// Exposure parameters handed to the exposure subsystem and stamped into
/// recording metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetSettings {
    pub label: String,
    /// EV stops.
    pub exposure_bias: f32,
    pub iso: f32,
    /// Kelvin.
    pub white_balance: f32,
    pub metering_zone: MeteringZone,
}

impl PresetSettings {
    pub fn custom(
        label: impl Into<String>,
        exposure_bias: f32,
        iso: f32,
        white_balance: f32,
    ) -> Self {
        Self {
            label: label.into(),
            exposure_bias,
            iso,
            white_balance,
            metering_zone: MeteringZone::Center,
        }
    }

    pub fn with_metering_zone(mut self, zone: MeteringZone) -> Self {
        self.metering_zone = zone;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(-8.0..=8.0).contains(&self.exposure_bias) {
            return Err(format!("Exposure bias {} outside -8..8 EV", self.exposure_bias));
        }
        if self.iso <= 0.0 {
            return Err("ISO must be positive".to_string());
        }
        if !(1500.0..=12000.0).contains(&self.white_balance) {
            return Err(format!("White balance {}K outside 1500..12000K", self.white_balance));
        }
        Ok(())
    }
}

impl Default for PresetSettings {
    fn default() -> Self {
        ShootingPreset::Daylight.settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floodlight_preset_table() {
        let settings = ShootingPreset::Floodlight.settings();
        assert_eq!(settings.label, "floodlight");
        assert_eq!(settings.exposure_bias, -1.0);
        assert_eq!(settings.iso, 800.0);
        assert_eq!(settings.white_balance, 4000.0);
        assert_eq!(settings.metering_zone, MeteringZone::BottomCenter);
    }

    #[test]
    fn test_every_preset_is_valid() {
        for preset in ShootingPreset::all() {
            assert!(preset.settings().validate().is_ok(), "{:?}", preset);
        }
    }

    #[test]
    fn test_zone_points_cover_the_grid() {
        for zone in MeteringZone::all() {
            let p = zone.point_of_interest();
            assert!(p.x > 0.0 && p.x < 1.0);
            assert!(p.y > 0.0 && p.y < 1.0);
        }
        assert_eq!(
            MeteringZone::Center.point_of_interest(),
            NormalizedPoint { x: 0.5, y: 0.5 }
        );
        let bottom = MeteringZone::BottomCenter.point_of_interest();
        assert!(bottom.y > 0.8);
    }

    #[test]
    fn test_zone_serializes_camel_case() {
        let json = serde_json::to_string(&MeteringZone::BottomCenter).unwrap();
        assert_eq!(json, "\"bottomCenter\"");
        assert_eq!(MeteringZone::parse("bottomcenter"), Some(MeteringZone::BottomCenter));
    }

    #[test]
    fn test_custom_preset_validation() {
        let bad = PresetSettings::custom("night", 0.0, 0.0, 4000.0);
        assert!(bad.validate().is_err());
        let ok = PresetSettings::custom("night", 1.0, 3200.0, 3500.0)
            .with_metering_zone(MeteringZone::TopCenter);
        assert!(ok.validate().is_ok());
        assert_eq!(ok.metering_zone, MeteringZone::TopCenter);
    }
}
