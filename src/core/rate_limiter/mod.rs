//! Single-window admission counters
//!
//! A `WindowCounter` answers one question: may `subject` consume one unit of
//! a `Window` right now? Two interchangeable implementations exist:
//!
//! - `TokenBucketCounter` - in-process token buckets, one per subject,
//!   refilling continuously at `limit / length`
//! - `RedisWindowCounter` - a sorted set of admitted-request markers per
//!   subject, trimmed and counted atomically by a server-side script
//!
//! The quota engine composes four of these; the IP limiter consumes one.

mod counter;
mod ip;
mod redis;
mod types;

pub use counter::{TokenBucketCounter, WindowCounter};
pub use ip::IpRateLimiter;
pub use redis::RedisWindowCounter;
pub use types::Window;
