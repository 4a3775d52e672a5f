//! Core admission-control components
//!
//! - `rate_limiter` - single-window counters (token bucket, Redis sorted set)
//!   and the IP admission limiter
//! - `quota` - the four-counter quota engine coordinating per-user and
//!   application-global windows

pub mod quota;
pub mod rate_limiter;
