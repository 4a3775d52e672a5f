//! Quota engine data types

use crate::config::QuotaConfig;
use crate::core::rate_limiter::Window;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Sentinel subject identifying the application-global scope
pub const GLOBAL_SCOPE_KEY: &str = "_global_";

/// The window that denied an admission, in fixed evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuotaExceededReason {
    UserMinute,
    UserDay,
    GlobalMinute,
    GlobalDay,
}

impl QuotaExceededReason {
    /// Wire form used in the `X-RateLimit-Reason` header
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserMinute => "user-minute",
            Self::UserDay => "user-day",
            Self::GlobalMinute => "global-minute",
            Self::GlobalDay => "global-day",
        }
    }
}

impl fmt::Display for QuotaExceededReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which global window a reconciliation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindowKind {
    Minute,
    Day,
}

/// Outcome of one `check_and_increment` call.
///
/// A denial is a normal decision value, not an error: `allowed` is false and
/// `reason` names the first exhausted window in evaluation order.
#[derive(Debug, Clone, Serialize)]
pub struct QuotaDecision {
    /// Whether the request may proceed upstream
    pub allowed: bool,
    /// First exhausted window when denied
    pub reason: Option<QuotaExceededReason>,
    /// Requests the user has left in the minute window
    pub minute_remaining: u32,
    /// Requests the user has left in the day window
    pub day_remaining: u32,
    /// When the minute window next resets
    pub minute_reset_at: DateTime<Utc>,
    /// When the day window next resets
    pub day_reset_at: DateTime<Utc>,
}

impl QuotaDecision {
    /// An admission carrying the user's post-consumption remainders
    pub fn admitted(minute_remaining: u32, day_remaining: u32, windows: &QuotaWindows) -> Self {
        Self::build(None, minute_remaining, day_remaining, windows)
    }

    /// A denial naming the first exhausted window
    pub fn denied(
        reason: QuotaExceededReason,
        minute_remaining: u32,
        day_remaining: u32,
        windows: &QuotaWindows,
    ) -> Self {
        Self::build(Some(reason), minute_remaining, day_remaining, windows)
    }

    fn build(
        reason: Option<QuotaExceededReason>,
        minute_remaining: u32,
        day_remaining: u32,
        windows: &QuotaWindows,
    ) -> Self {
        let now = Utc::now();
        Self {
            allowed: reason.is_none(),
            reason,
            minute_remaining,
            day_remaining,
            minute_reset_at: next_window_boundary(now, windows.user_minute.length),
            day_reset_at: next_window_boundary(now, windows.user_day.length),
        }
    }

    /// Seconds until the denying window resets; zero for admissions
    pub fn retry_after(&self) -> Duration {
        let reset_at = match self.reason {
            Some(QuotaExceededReason::UserMinute) | Some(QuotaExceededReason::GlobalMinute) => {
                self.minute_reset_at
            }
            Some(QuotaExceededReason::UserDay) | Some(QuotaExceededReason::GlobalDay) => {
                self.day_reset_at
            }
            None => return Duration::ZERO,
        };
        let secs = (reset_at - Utc::now()).num_seconds().max(1);
        Duration::from_secs(secs as u64)
    }
}

/// Per-user usage snapshot
#[derive(Debug, Clone, Copy, Serialize)]
pub struct UserStats {
    /// Requests consumed from the user's minute window
    pub minute_used: u32,
    /// Requests consumed from the user's day window
    pub day_used: u32,
}

/// Application-global headroom snapshot
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GlobalStats {
    /// Requests left in the global minute window
    pub minute_remaining: u32,
    /// Requests left in the global day window
    pub day_remaining: u32,
}

/// The four windows a decision spans
#[derive(Debug, Clone, Copy)]
pub struct QuotaWindows {
    pub user_minute: Window,
    pub user_day: Window,
    pub global_minute: Window,
    pub global_day: Window,
}

impl QuotaWindows {
    /// Build the window set from configuration
    pub fn from_config(config: &QuotaConfig) -> Self {
        Self {
            user_minute: Window::per_minute(config.per_user_minute_limit),
            user_day: Window::per_day(config.per_user_day_limit),
            global_minute: Window::per_minute(config.global_minute_limit),
            global_day: Window::per_day(config.global_day_limit),
        }
    }
}

/// Reconciliation payload derived from upstream response headers
#[derive(Debug, Clone, Copy)]
pub struct GlobalSync {
    /// Requests the upstream reports as consumed in the window
    pub used: u32,
    /// Requests the upstream reports as remaining
    pub remaining: u32,
    /// Time until the upstream's window resets
    pub reset_after: Duration,
}

/// The window boundary following `now`, rounded up to the next
/// window-length tick of the wall clock.
pub(crate) fn next_window_boundary(now: DateTime<Utc>, length: Duration) -> DateTime<Utc> {
    let len = length.as_secs().max(1) as i64;
    let next = (now.timestamp().div_euclid(len) + 1) * len;
    DateTime::<Utc>::from_timestamp(next, 0).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_wire_form() {
        assert_eq!(QuotaExceededReason::UserMinute.as_str(), "user-minute");
        assert_eq!(QuotaExceededReason::GlobalDay.as_str(), "global-day");
        assert_eq!(
            serde_json::to_string(&QuotaExceededReason::GlobalMinute).unwrap(),
            "\"global-minute\""
        );
    }

    #[test]
    fn test_next_window_boundary_rounds_up() {
        let now = DateTime::<Utc>::from_timestamp(125, 0).unwrap();
        let boundary = next_window_boundary(now, Duration::from_secs(60));
        assert_eq!(boundary.timestamp(), 180);

        // Exactly on a tick still advances to the next one.
        let now = DateTime::<Utc>::from_timestamp(120, 0).unwrap();
        let boundary = next_window_boundary(now, Duration::from_secs(60));
        assert_eq!(boundary.timestamp(), 180);
    }

    #[test]
    fn test_retry_after_tracks_denying_window() {
        let windows = QuotaWindows::from_config(&QuotaConfig::default());
        let denied = QuotaDecision::denied(QuotaExceededReason::UserMinute, 0, 10, &windows);
        let retry = denied.retry_after();
        assert!(retry >= Duration::from_secs(1));
        assert!(retry <= Duration::from_secs(60));

        let denied = QuotaDecision::denied(QuotaExceededReason::GlobalDay, 5, 0, &windows);
        let retry = denied.retry_after();
        assert!(retry >= Duration::from_secs(1));
        assert!(retry <= Duration::from_secs(86_400));
    }

    #[test]
    fn test_admitted_decision_has_no_retry() {
        let windows = QuotaWindows::from_config(&QuotaConfig::default());
        let admitted = QuotaDecision::admitted(19, 1999, &windows);
        assert!(admitted.allowed);
        assert_eq!(admitted.retry_after(), Duration::ZERO);
    }
}
