//! Aspect-ratio classification by GCD reduction.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named bucket a pixel size falls into after exact reduction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatioClass {
    Ratio16x9,
    Ratio4x3,
    Ratio3x2,
    Other { width: u32, height: u32 },
}

impl fmt::Display for AspectRatioClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AspectRatioClass::Ratio16x9 => write!(f, "16:9"),
            AspectRatioClass::Ratio4x3 => write!(f, "4:3"),
            AspectRatioClass::Ratio3x2 => write!(f, "3:2"),
            AspectRatioClass::Other { width, height } => write!(f, "{}:{}", width, height),
        }
    }
}

pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

/// Reduce `width:height` by their GCD.
pub fn reduce(width: u32, height: u32) -> (u32, u32) {
    match gcd(width, height) {
        0 => (width, height),
        d => (width / d, height / d),
    }
}

pub fn classify(width: u32, height: u32) -> AspectRatioClass {
    match reduce(width, height) {
        (16, 9) => AspectRatioClass::Ratio16x9,
        (4, 3) => AspectRatioClass::Ratio4x3,
        (3, 2) => AspectRatioClass::Ratio3x2,
        (width, height) => AspectRatioClass::Other { width, height },
    }
}

/// Display string, e.g. `"16:9"` or `"64:27"`.
pub fn ratio_label(width: u32, height: u32) -> String {
    classify(width, height).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_ratios() {
        assert_eq!(classify(3840, 2160), AspectRatioClass::Ratio16x9);
        assert_eq!(classify(1920, 1080), AspectRatioClass::Ratio16x9);
        assert_eq!(classify(4032, 3024), AspectRatioClass::Ratio4x3);
        assert_eq!(classify(640, 480), AspectRatioClass::Ratio4x3);
        assert_eq!(classify(3024, 2016), AspectRatioClass::Ratio3x2);
    }

    #[test]
    fn test_unnamed_ratio_is_reduced() {
        assert_eq!(ratio_label(2560, 1080), "64:27");
        assert_eq!(ratio_label(1440, 1080), "4:3");
        assert_eq!(ratio_label(1000, 1000), "1:1");
    }

    #[test]
    fn test_zero_dimensions_do_not_panic() {
        assert_eq!(reduce(0, 0), (0, 0));
        assert_eq!(ratio_label(0, 1080), "0:1");
    }
}
