//! Redis-backed sliding window counter
//!
//! Counts admitted requests as members of a sorted set scored by admission
//! time. A single server-side script trims markers older than the window,
//! counts the survivors, and only inserts a new marker when the count is
//! under capacity, making check+increment one atomic round trip across any
//! number of gateway processes. Keys expire a little after the window
//! length, so idle subjects need no sweeping.

use super::types::Window;
use crate::core::rate_limiter::WindowCounter;
use crate::storage::RedisPool;
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Script;
use uuid::Uuid;

/// Grace added to key TTLs beyond the window length
const KEY_TTL_GRACE_MS: i64 = 1000;

const ALLOW_SCRIPT: &str = r#"
local now = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', KEYS[1], 0, now - window_ms)
local count = redis.call('ZCARD', KEYS[1])
if count >= limit then
    return {0, count}
end

redis.call('ZADD', KEYS[1], now, ARGV[4])
redis.call('PEXPIRE', KEYS[1], window_ms + tonumber(ARGV[5]))
return {1, count + 1}
"#;

const COUNT_SCRIPT: &str = r#"
redis.call('ZREMRANGEBYSCORE', KEYS[1], 0, tonumber(ARGV[1]))
return redis.call('ZCARD', KEYS[1])
"#;

/// Distributed window counter over a shared Redis instance
pub struct RedisWindowCounter {
    pool: RedisPool,
    window: Window,
    key_prefix: String,
    allow_script: Script,
    count_script: Script,
}

impl RedisWindowCounter {
    /// Create a counter for the given window; keys are `{prefix}{subject}`
    pub fn new(pool: RedisPool, window: Window, key_prefix: impl Into<String>) -> Self {
        Self {
            pool,
            window,
            key_prefix: key_prefix.into(),
            allow_script: Script::new(ALLOW_SCRIPT),
            count_script: Script::new(COUNT_SCRIPT),
        }
    }

    fn key(&self, subject: &str) -> String {
        format!("{}{}", self.key_prefix, subject)
    }

    fn window_ms(&self) -> i64 {
        self.window.length.as_millis() as i64
    }
}

#[async_trait]
impl WindowCounter for RedisWindowCounter {
    fn window(&self) -> Window {
        self.window
    }

    async fn allow(&self, subject: &str) -> Result<bool> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let marker = Uuid::new_v4().to_string();
        let mut conn = self.pool.connection();

        let reply: Vec<i64> = self
            .allow_script
            .key(self.key(subject))
            .arg(now_ms)
            .arg(self.window_ms())
            .arg(self.window.limit)
            .arg(marker)
            .arg(KEY_TTL_GRACE_MS)
            .invoke_async(&mut conn)
            .await
            .map_err(GatewayError::Redis)?;

        Ok(reply.first().copied() == Some(1))
    }

    async fn remaining(&self, subject: &str) -> Result<u32> {
        let cutoff = chrono::Utc::now().timestamp_millis() - self.window_ms();
        let mut conn = self.pool.connection();

        let count: i64 = self
            .count_script
            .key(self.key(subject))
            .arg(cutoff)
            .invoke_async(&mut conn)
            .await
            .map_err(GatewayError::Redis)?;

        Ok(self.window.limit.saturating_sub(count.max(0) as u32))
    }

    async fn release(&self, subject: &str) -> Result<()> {
        // Undo the most recent admission by dropping the newest marker.
        let mut conn = self.pool.connection();
        let _: redis::Value = conn
            .zpopmax(self.key(subject), 1)
            .await
            .map_err(GatewayError::Redis)?;
        Ok(())
    }
}
