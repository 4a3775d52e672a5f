//! IP admission limiter
//!
//! Guards unauthenticated routes with one window per caller IP. A single
//! counter means admission is a plain boolean; nothing needs rolling back.

use super::counter::{TokenBucketCounter, WindowCounter};
use super::types::Window;
use crate::utils::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Per-IP admission limiter over a single window
pub struct IpRateLimiter {
    counter: Arc<dyn WindowCounter>,
    /// Retained for the idle sweep; `None` for the TTL-based backend
    memory: Option<Arc<TokenBucketCounter>>,
}

impl IpRateLimiter {
    /// Build on in-process token buckets
    pub fn in_memory(window: Window) -> Self {
        let counter = Arc::new(TokenBucketCounter::new(window));
        Self {
            counter: counter.clone(),
            memory: Some(counter),
        }
    }

    /// Build on any window counter (e.g. the Redis backend)
    pub fn with_counter(counter: Arc<dyn WindowCounter>) -> Self {
        Self {
            counter,
            memory: None,
        }
    }

    /// May this caller proceed? Consumes one unit when true.
    pub async fn allow(&self, addr: &str) -> Result<bool> {
        self.counter.allow(addr).await
    }

    /// Units the caller has left in the current window
    pub async fn remaining(&self, addr: &str) -> Result<u32> {
        self.counter.remaining(addr).await
    }

    /// Window this limiter enforces
    pub fn window(&self) -> Window {
        self.counter.window()
    }

    /// Evict idle per-IP state (memory backend only)
    pub fn sweep_idle(&self, idle: Duration) -> usize {
        self.memory.as_ref().map_or(0, |counter| counter.sweep(idle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_per_ip_isolation() {
        let limiter = IpRateLimiter::in_memory(Window::per_minute(2));

        assert!(limiter.allow("10.0.0.1").await.unwrap());
        assert!(limiter.allow("10.0.0.1").await.unwrap());
        assert!(!limiter.allow("10.0.0.1").await.unwrap());

        // A different caller is unaffected.
        assert!(limiter.allow("10.0.0.2").await.unwrap());
    }

    #[tokio::test]
    async fn test_remaining_decreases() {
        let limiter = IpRateLimiter::in_memory(Window::per_minute(5));
        assert_eq!(limiter.remaining("10.0.0.1").await.unwrap(), 5);
        limiter.allow("10.0.0.1").await.unwrap();
        assert_eq!(limiter.remaining("10.0.0.1").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_sweep_idle() {
        let limiter = IpRateLimiter::in_memory(Window::per_minute(5));
        limiter.allow("10.0.0.1").await.unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.sweep_idle(Duration::from_millis(10)), 1);
    }
}
