//! Quota engine
//!
//! Coordinates the four admission counters (user-minute, user-day,
//! global-minute, global-day) behind one backend-agnostic contract. The
//! backend is chosen once at construction; callers never see which one is
//! running.

use super::headers;
use super::memory::MemoryQuotaStore;
use super::redis::RedisQuotaStore;
use super::types::{GlobalStats, GlobalSync, QuotaDecision, QuotaWindowKind, QuotaWindows, UserStats};
use crate::config::QuotaConfig;
use crate::storage::RedisPool;
use crate::utils::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Margin added to the upstream-reported reset when re-keying distributed
/// counters, so reconciled markers outlive the window they describe
const RESET_TTL_MARGIN: Duration = Duration::from_secs(5);

/// The four-counter storage contract.
///
/// `check_and_increment` must be atomic across all four counters: at its
/// end either every counter reflects exactly one consumed unit, or none do.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Atomically evaluate and consume one unit across the four windows
    async fn check_and_increment(&self, subject: &str) -> Result<QuotaDecision>;

    /// Force one global window to match the upstream's reported usage
    async fn sync_global(&self, kind: QuotaWindowKind, sync: GlobalSync) -> Result<()>;

    /// Per-user usage snapshot
    async fn user_stats(&self, subject: &str) -> Result<UserStats>;

    /// Global headroom snapshot
    async fn global_stats(&self) -> Result<GlobalStats>;
}

/// Backend-agnostic quota engine
pub struct QuotaEngine {
    store: Arc<dyn QuotaStore>,
    windows: QuotaWindows,
    upstream_minute_limit: u64,
    upstream_day_limit: u64,
}

impl QuotaEngine {
    /// Build over an existing store
    pub fn new(store: Arc<dyn QuotaStore>, config: &QuotaConfig) -> Self {
        Self {
            store,
            windows: QuotaWindows::from_config(config),
            upstream_minute_limit: config.upstream_minute_limit as u64,
            upstream_day_limit: config.upstream_day_limit as u64,
        }
    }

    /// Build over in-process token buckets
    pub fn in_memory(config: &QuotaConfig) -> Self {
        Self::new(Arc::new(MemoryQuotaStore::from_config(config)), config)
    }

    /// Build over Redis sorted-set counters
    pub fn with_redis(pool: RedisPool, config: &QuotaConfig) -> Self {
        Self::new(Arc::new(RedisQuotaStore::from_config(pool, config)), config)
    }

    /// Decide whether `subject` may make one upstream request now,
    /// consuming quota when admitted.
    pub async fn check_and_increment(&self, subject: &str) -> Result<QuotaDecision> {
        let decision = self.store.check_and_increment(subject).await?;
        if let Some(reason) = decision.reason {
            debug!(subject, reason = %reason, "quota denied");
        }
        Ok(decision)
    }

    /// Reconcile the global counters against the upstream's own
    /// enforcement report. Missing or malformed headers are skipped.
    pub async fn update_from_headers(&self, headers: &HeaderMap) -> Result<()> {
        let snapshot = match headers::snapshot(headers) {
            Some(snapshot) => snapshot,
            None => return Ok(()),
        };

        let kind = self.classify(snapshot.limit);
        let window = match kind {
            QuotaWindowKind::Minute => self.windows.global_minute,
            QuotaWindowKind::Day => self.windows.global_day,
        };

        let used = snapshot.limit.saturating_sub(snapshot.remaining);
        let sync = GlobalSync {
            used: used.min(u32::MAX as u64) as u32,
            remaining: snapshot.remaining.min(u32::MAX as u64) as u32,
            reset_after: snapshot.reset_after.unwrap_or(window.length) + RESET_TTL_MARGIN,
        };

        debug!(
            limit = snapshot.limit,
            remaining = snapshot.remaining,
            used = sync.used,
            "reconciling global quota from upstream headers"
        );
        self.store.sync_global(kind, sync).await
    }

    /// Per-user usage snapshot
    pub async fn user_stats(&self, subject: &str) -> Result<UserStats> {
        self.store.user_stats(subject).await
    }

    /// Global headroom snapshot
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        self.store.global_stats().await
    }

    /// Windows this engine enforces
    pub fn windows(&self) -> &QuotaWindows {
        &self.windows
    }

    /// Which global window did the upstream just enforce? The reported
    /// limit sits near one of the two published limits.
    fn classify(&self, limit: u64) -> QuotaWindowKind {
        if limit.abs_diff(self.upstream_minute_limit) <= limit.abs_diff(self.upstream_day_limit) {
            QuotaWindowKind::Minute
        } else {
            QuotaWindowKind::Day
        }
    }
}
