//! In-process quota store
//!
//! Four token-bucket window counters, one per (scope, window) pair. The two
//! global counters are keyed by the scope sentinel so a single bucket backs
//! each. Evaluation follows the fixed order user-minute, user-day,
//! global-minute, global-day; on the first exhausted window every counter
//! consumed earlier in the call is released, restoring pre-call state
//! exactly.

use super::engine::QuotaStore;
use super::types::{
    GLOBAL_SCOPE_KEY, GlobalStats, GlobalSync, QuotaDecision, QuotaExceededReason,
    QuotaWindowKind, QuotaWindows, UserStats,
};
use crate::config::QuotaConfig;
use crate::core::rate_limiter::{TokenBucketCounter, WindowCounter};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

/// Memory-backed quota store
pub struct MemoryQuotaStore {
    windows: QuotaWindows,
    user_minute: TokenBucketCounter,
    user_day: TokenBucketCounter,
    global_minute: TokenBucketCounter,
    global_day: TokenBucketCounter,
}

impl MemoryQuotaStore {
    /// Build the four counters from the configured windows
    pub fn new(windows: QuotaWindows) -> Self {
        Self {
            windows,
            user_minute: TokenBucketCounter::new(windows.user_minute),
            user_day: TokenBucketCounter::new(windows.user_day),
            global_minute: TokenBucketCounter::new(windows.global_minute),
            global_day: TokenBucketCounter::new(windows.global_day),
        }
    }

    /// Build from configuration
    pub fn from_config(config: &QuotaConfig) -> Self {
        Self::new(QuotaWindows::from_config(config))
    }

    /// Evict per-user state idle longer than `idle`. The global sentinel
    /// buckets live in separate counters and are never touched.
    pub fn sweep(&self, idle: Duration) -> usize {
        self.user_minute.sweep(idle) + self.user_day.sweep(idle)
    }

    /// Start the periodic housekeeping sweep. The returned handle stops it.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        idle: Duration,
    ) -> SweeperHandle {
        let store = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the first tick fires immediately
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = store.sweep(idle);
                        if evicted > 0 {
                            debug!(evicted, "evicted idle per-user quota state");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
        });

        SweeperHandle {
            shutdown: shutdown_tx,
            handle,
        }
    }

    async fn denied(&self, reason: QuotaExceededReason, subject: &str) -> Result<QuotaDecision> {
        Ok(QuotaDecision::denied(
            reason,
            self.user_minute.remaining(subject).await?,
            self.user_day.remaining(subject).await?,
            &self.windows,
        ))
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn check_and_increment(&self, subject: &str) -> Result<QuotaDecision> {
        // Fixed order; the first failure rolls back everything consumed
        // earlier in this call and nothing else.
        if !self.user_minute.allow(subject).await? {
            return self.denied(QuotaExceededReason::UserMinute, subject).await;
        }

        if !self.user_day.allow(subject).await? {
            self.user_minute.release(subject).await?;
            return self.denied(QuotaExceededReason::UserDay, subject).await;
        }

        if !self.global_minute.allow(GLOBAL_SCOPE_KEY).await? {
            self.user_minute.release(subject).await?;
            self.user_day.release(subject).await?;
            return self.denied(QuotaExceededReason::GlobalMinute, subject).await;
        }

        if !self.global_day.allow(GLOBAL_SCOPE_KEY).await? {
            self.user_minute.release(subject).await?;
            self.user_day.release(subject).await?;
            self.global_minute.release(GLOBAL_SCOPE_KEY).await?;
            return self.denied(QuotaExceededReason::GlobalDay, subject).await;
        }

        Ok(QuotaDecision::admitted(
            self.user_minute.remaining(subject).await?,
            self.user_day.remaining(subject).await?,
            &self.windows,
        ))
    }

    async fn sync_global(&self, kind: QuotaWindowKind, sync: GlobalSync) -> Result<()> {
        // The upstream's remaining count is authoritative; force the bucket
        // to it, clamped to local capacity.
        match kind {
            QuotaWindowKind::Minute => {
                self.global_minute.set_available(GLOBAL_SCOPE_KEY, sync.remaining)
            }
            QuotaWindowKind::Day => {
                self.global_day.set_available(GLOBAL_SCOPE_KEY, sync.remaining)
            }
        }
        Ok(())
    }

    async fn user_stats(&self, subject: &str) -> Result<UserStats> {
        let minute_remaining = self.user_minute.remaining(subject).await?;
        let day_remaining = self.user_day.remaining(subject).await?;
        Ok(UserStats {
            minute_used: self.windows.user_minute.limit.saturating_sub(minute_remaining),
            day_used: self.windows.user_day.limit.saturating_sub(day_remaining),
        })
    }

    async fn global_stats(&self) -> Result<GlobalStats> {
        Ok(GlobalStats {
            minute_remaining: self.global_minute.remaining(GLOBAL_SCOPE_KEY).await?,
            day_remaining: self.global_day.remaining(GLOBAL_SCOPE_KEY).await?,
        })
    }
}

/// Handle for the housekeeping sweep task
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweep loop to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}
