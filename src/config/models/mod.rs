//! Configuration data models
//!
//! This module defines all configuration structures used throughout the relay.

pub mod gateway;
pub mod quota;
pub mod server;
pub mod storage;
pub mod upstream;

// Re-export all configuration types
pub use gateway::*;
pub use quota::*;
pub use server::*;
pub use storage::*;
pub use upstream::*;

/// Default server host
pub fn default_host() -> String {
    "0.0.0.0".to_string()
}

/// Default server port
pub fn default_port() -> u16 {
    8000
}

/// Default timeout in seconds
pub fn default_timeout() -> u64 {
    30
}

/// Default maximum body size in bytes
pub fn default_max_body_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Default Redis connection limit
pub fn default_redis_max_connections() -> u32 {
    10
}

/// Default connection timeout in seconds
pub fn default_connection_timeout() -> u64 {
    5
}
