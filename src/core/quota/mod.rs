//! Quota engine
//!
//! Admission control for outbound upstream calls. Every request spans four
//! counters - user-minute, user-day, global-minute, global-day - and either
//! consumes one unit from all of them or from none. The upstream's own
//! rate-limit headers periodically resynchronize the global counters so
//! local accounting cannot drift away from the authoritative enforcement.

mod engine;
mod headers;
mod memory;
mod redis;
mod types;

pub use engine::{QuotaEngine, QuotaStore};
pub use memory::{MemoryQuotaStore, SweeperHandle};
pub use redis::RedisQuotaStore;
pub use types::{
    GLOBAL_SCOPE_KEY, GlobalStats, GlobalSync, QuotaDecision, QuotaExceededReason,
    QuotaWindowKind, QuotaWindows, UserStats,
};
