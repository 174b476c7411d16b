//! Recording duration timing
//!
//! Simple monotonic clock for the published duration counter.

use std::time::{Duration, Instant};

/// Monotonic clock started when a recording begins
///
/// Wall-clock changes during a recording do not affect the counter.
#[derive(Debug, Clone, Copy)]
pub struct RecordingClock {
    start: Instant,
}

impl RecordingClock {
    /// Create a clock with the current instant as time zero
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Create a clock from an existing start instant
    pub fn from_instant(start: Instant) -> Self {
        Self { start }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time at a given instant. Instants before the start read as zero.
    #[inline]
    pub fn elapsed_at(&self, instant: Instant) -> Duration {
        instant.saturating_duration_since(self.start)
    }

    pub fn start_instant(&self) -> Instant {
        self.start
    }

    /// Counter text, e.g. "03:07" or "1:02:45" past the hour.
    pub fn label(&self) -> String {
        format_duration(self.elapsed())
    }
}

impl Default for RecordingClock {
    fn default() -> Self {
        Self::new()
    }
}

pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::ZERO), "00:00");
        assert_eq!(format_duration(Duration::from_secs(187)), "03:07");
        assert_eq!(format_duration(Duration::from_millis(59_999)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(3765)), "1:02:45");
    }

    #[test]
    fn test_elapsed_at_is_monotonic() {
        let start = Instant::now();
        let clock = RecordingClock::from_instant(start);
        assert_eq!(clock.elapsed_at(start), Duration::ZERO);
        let later = start + Duration::from_secs(5);
        assert_eq!(clock.elapsed_at(later), Duration::from_secs(5));
        assert!(clock.elapsed() <= clock.elapsed_at(Instant::now()));
    }
}
