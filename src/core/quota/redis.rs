//! Distributed quota store
//!
//! The four counters live in Redis as sorted sets of admission markers, and
//! the whole evaluate-then-commit sequence runs as one server-side script
//! spanning the four keys. Either the script inserts a marker into all four
//! sets or it touches none of them, so the no-partial-state invariant holds
//! across any number of gateway processes without client-side locking.

use super::engine::QuotaStore;
use super::types::{
    GlobalStats, GlobalSync, QuotaDecision, QuotaExceededReason, QuotaWindowKind, QuotaWindows,
    UserStats,
};
use crate::config::QuotaConfig;
use crate::storage::RedisPool;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use redis::Script;
use uuid::Uuid;

/// Grace added to key TTLs beyond the window length
const KEY_TTL_GRACE_MS: i64 = 1000;

/// Evaluate all four windows in fixed order, then commit one marker to each
/// only if every window has headroom.
///
/// KEYS: user-minute, user-day, global-minute, global-day
/// ARGV: now_ms, minute_ms, day_ms, user_minute_limit, user_day_limit,
///       global_minute_limit, global_day_limit, marker, ttl_grace_ms
/// Reply: {admitted, failed_step, user_minute_count, user_day_count}
const CHECK_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local windows = { tonumber(ARGV[2]), tonumber(ARGV[3]), tonumber(ARGV[2]), tonumber(ARGV[3]) }
local limits = { tonumber(ARGV[4]), tonumber(ARGV[5]), tonumber(ARGV[6]), tonumber(ARGV[7]) }
local counts = {}

for i = 1, 4 do
    redis.call('ZREMRANGEBYSCORE', KEYS[i], 0, now - windows[i])
    counts[i] = redis.call('ZCARD', KEYS[i])
end

for i = 1, 4 do
    if counts[i] >= limits[i] then
        return {0, i, counts[1], counts[2]}
    end
end

for i = 1, 4 do
    redis.call('ZADD', KEYS[i], now, ARGV[8])
    redis.call('PEXPIRE', KEYS[i], windows[i] + tonumber(ARGV[9]))
end
return {1, 0, counts[1] + 1, counts[2] + 1}
"#;

/// Replace a global counter's markers with `used` synthetic ones stamped
/// now, expiring after the upstream-reported reset.
///
/// KEYS: global counter
/// ARGV: used, now_ms, ttl_ms, marker_prefix
const SYNC_SCRIPT: &str = r#"
redis.call('DEL', KEYS[1])
local used = tonumber(ARGV[1])
local now = tonumber(ARGV[2])
for i = 1, used do
    redis.call('ZADD', KEYS[1], now, ARGV[4] .. ':' .. i)
end
if used > 0 then
    redis.call('PEXPIRE', KEYS[1], tonumber(ARGV[3]))
end
return used
"#;

/// Trim one counter to its window and report the surviving count.
///
/// KEYS: counter; ARGV: cutoff_ms
const COUNT_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], 0, tonumber(ARGV[1]))
return redis.call('ZCARD', KEYS[1])
"#;

/// Redis-backed quota store
pub struct RedisQuotaStore {
    pool: RedisPool,
    windows: QuotaWindows,
    key_prefix: String,
    check_script: Script,
    sync_script: Script,
    count_script: Script,
}

impl RedisQuotaStore {
    /// Build over an established pool
    pub fn new(pool: RedisPool, windows: QuotaWindows, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            windows,
            key_prefix: key_prefix.into(),
            check_script: Script::new(CHECK_SCRIPT),
            sync_script: Script::new(SYNC_SCRIPT),
            count_script: Script::new(COUNT_SCRIPT),
        }
    }

    /// Build from configuration
    pub fn from_config(pool: RedisPool, config: &QuotaConfig) -> Self {
        Self::new(
            pool,
            QuotaWindows::from_config(config),
            config.key_prefix.clone(),
        )
    }

    fn user_key(&self, subject: &str, kind: QuotaWindowKind) -> String {
        match kind {
            QuotaWindowKind::Minute => format!("{}user:{}:minute", self.key_prefix, subject),
            QuotaWindowKind::Day => format!("{}user:{}:day", self.key_prefix, subject),
        }
    }

    fn global_key(&self, kind: QuotaWindowKind) -> String {
        match kind {
            QuotaWindowKind::Minute => format!("{}global:minute", self.key_prefix),
            QuotaWindowKind::Day => format!("{}global:day", self.key_prefix),
        }
    }

    fn minute_ms(&self) -> i64 {
        self.windows.user_minute.length.as_millis() as i64
    }

    fn day_ms(&self) -> i64 {
        self.windows.user_day.length.as_millis() as i64
    }

    async fn window_count(&self, key: &str, window_ms: i64) -> Result<u32> {
        let cutoff = chrono::Utc::now().timestamp_millis() - window_ms;
        let mut conn = self.pool.connection();
        let count: i64 = self
            .count_script
            .key(key)
            .arg(cutoff)
            .invoke_async(&mut conn)
            .await
            .map_err(GatewayError::Redis)?;
        Ok(count.max(0) as u32)
    }
}

#[async_trait]
impl QuotaStore for RedisQuotaStore {
    async fn check_and_increment(&self, subject: &str) -> Result<QuotaDecision> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let marker = Uuid::new_v4().to_string();
        let mut conn = self.pool.connection();

        let reply: Vec<i64> = self
            .check_script
            .key(self.user_key(subject, QuotaWindowKind::Minute))
            .key(self.user_key(subject, QuotaWindowKind::Day))
            .key(self.global_key(QuotaWindowKind::Minute))
            .key(self.global_key(QuotaWindowKind::Day))
            .arg(now_ms)
            .arg(self.minute_ms())
            .arg(self.day_ms())
            .arg(self.windows.user_minute.limit)
            .arg(self.windows.user_day.limit)
            .arg(self.windows.global_minute.limit)
            .arg(self.windows.global_day.limit)
            .arg(marker)
            .arg(KEY_TTL_GRACE_MS)
            .invoke_async(&mut conn)
            .await
            .map_err(GatewayError::Redis)?;

        if reply.len() < 4 {
            return Err(GatewayError::Internal(format!(
                "unexpected quota script reply: {:?}",
                reply
            )));
        }

        let minute_count = reply[2].max(0) as u32;
        let day_count = reply[3].max(0) as u32;
        let minute_remaining = self.windows.user_minute.limit.saturating_sub(minute_count);
        let day_remaining = self.windows.user_day.limit.saturating_sub(day_count);

        if reply[0] == 1 {
            return Ok(QuotaDecision::admitted(
                minute_remaining,
                day_remaining,
                &self.windows,
            ));
        }

        let reason = match reply[1] {
            1 => QuotaExceededReason::UserMinute,
            2 => QuotaExceededReason::UserDay,
            3 => QuotaExceededReason::GlobalMinute,
            _ => QuotaExceededReason::GlobalDay,
        };
        Ok(QuotaDecision::denied(
            reason,
            minute_remaining,
            day_remaining,
            &self.windows,
        ))
    }

    async fn sync_global(&self, kind: QuotaWindowKind, sync: GlobalSync) -> Result<()> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let marker_prefix = format!("sync:{}", Uuid::new_v4());
        let mut conn = self.pool.connection();

        let _: i64 = self
            .sync_script
            .key(self.global_key(kind))
            .arg(sync.used)
            .arg(now_ms)
            .arg(sync.reset_after.as_millis() as i64)
            .arg(marker_prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(GatewayError::Redis)?;
        Ok(())
    }

    async fn user_stats(&self, subject: &str) -> Result<UserStats> {
        let minute_used = self
            .window_count(
                &self.user_key(subject, QuotaWindowKind::Minute),
                self.minute_ms(),
            )
            .await?;
        let day_used = self
            .window_count(&self.user_key(subject, QuotaWindowKind::Day), self.day_ms())
            .await?;
        Ok(UserStats {
            minute_used,
            day_used,
        })
    }

    async fn global_stats(&self) -> Result<GlobalStats> {
        let minute_count = self
            .window_count(&self.global_key(QuotaWindowKind::Minute), self.minute_ms())
            .await?;
        let day_count = self
            .window_count(&self.global_key(QuotaWindowKind::Day), self.day_ms())
            .await?;
        Ok(GlobalStats {
            minute_remaining: self.windows.global_minute.limit.saturating_sub(minute_count),
            day_remaining: self.windows.global_day.limit.saturating_sub(day_count),
        })
    }
}
