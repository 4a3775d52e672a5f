//! Storage layer
//!
//! Redis connectivity for the distributed quota backend.

pub mod redis;

pub use redis::RedisPool;
