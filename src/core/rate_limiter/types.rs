//! Window configuration

use std::time::Duration;

/// Immutable window configuration: a capacity over a span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// Window length
    pub length: Duration,
    /// Units admitted per window
    pub limit: u32,
}

impl Window {
    /// Create a window from a length and a limit
    pub fn new(length: Duration, limit: u32) -> Self {
        Self { length, limit }
    }

    /// A one-minute window
    pub fn per_minute(limit: u32) -> Self {
        Self::new(Duration::from_secs(60), limit)
    }

    /// A 24-hour window
    pub fn per_day(limit: u32) -> Self {
        Self::new(Duration::from_secs(86_400), limit)
    }

    /// Continuous refill rate in units per second
    pub fn refill_per_sec(&self) -> f64 {
        self.limit as f64 / self.length.as_secs_f64().max(f64::EPSILON)
    }
}
