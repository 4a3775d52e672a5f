//! Redis storage implementation
//!
//! Connection management for the distributed quota counters. Unlike a cache,
//! the quota backend has no degraded no-op mode: if Redis is unreachable,
//! admission must fail closed, so construction and every operation surface
//! errors to the caller.

mod pool;

pub use pool::RedisPool;
