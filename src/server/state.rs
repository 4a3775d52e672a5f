//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::quota::QuotaEngine;
use crate::core::rate_limiter::IpRateLimiter;
use crate::storage::RedisPool;
use std::sync::Arc;

/// HTTP server state shared across handlers.
///
/// All fields are wrapped in `Arc` (or are internally reference-counted)
/// for cheap sharing across workers.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (shared read-only)
    pub config: Arc<Config>,
    /// Quota engine deciding upstream admissions
    pub quota: Arc<QuotaEngine>,
    /// IP admission limiter for unauthenticated routes
    pub ip_limiter: Arc<IpRateLimiter>,
    /// Shared upstream HTTP client
    pub upstream: reqwest::Client,
    /// Redis pool when the distributed backend is active
    pub redis: Option<RedisPool>,
}

impl AppState {
    /// Create a new AppState with shared resources
    pub fn new(
        config: Config,
        quota: QuotaEngine,
        ip_limiter: IpRateLimiter,
        upstream: reqwest::Client,
        redis: Option<RedisPool>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            quota: Arc::new(quota),
            ip_limiter: Arc::new(ip_limiter),
            upstream,
            redis,
        }
    }
}
