//! Quota engine configuration
//!
//! Per-user and application-global admission limits, the backend selection,
//! and housekeeping intervals. The global limits default below the upstream's
//! published 100/minute and 10000/day so local accounting drift cannot push
//! the application over the shared quota.

use serde::{Deserialize, Serialize};

/// Quota engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Counter backend, selected at construction time
    #[serde(default)]
    pub backend: QuotaBackend,
    /// Requests a single user may make per minute
    #[serde(default = "default_per_user_minute_limit")]
    pub per_user_minute_limit: u32,
    /// Requests a single user may make per day
    #[serde(default = "default_per_user_day_limit")]
    pub per_user_day_limit: u32,
    /// Application-wide requests per minute
    #[serde(default = "default_global_minute_limit")]
    pub global_minute_limit: u32,
    /// Application-wide requests per day
    #[serde(default = "default_global_day_limit")]
    pub global_day_limit: u32,
    /// The upstream's published per-minute limit (reconciliation anchor)
    #[serde(default = "default_upstream_minute_limit")]
    pub upstream_minute_limit: u32,
    /// The upstream's published per-day limit (reconciliation anchor)
    #[serde(default = "default_upstream_day_limit")]
    pub upstream_day_limit: u32,
    /// Seconds between housekeeping sweeps (memory backend)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Idle seconds after which per-user state is evicted (memory backend)
    #[serde(default = "default_idle_eviction_secs")]
    pub idle_eviction_secs: u64,
    /// Key prefix for the distributed backend
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            backend: QuotaBackend::default(),
            per_user_minute_limit: default_per_user_minute_limit(),
            per_user_day_limit: default_per_user_day_limit(),
            global_minute_limit: default_global_minute_limit(),
            global_day_limit: default_global_day_limit(),
            upstream_minute_limit: default_upstream_minute_limit(),
            upstream_day_limit: default_upstream_day_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
            idle_eviction_secs: default_idle_eviction_secs(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl QuotaConfig {
    /// Merge quota configurations (other takes precedence)
    pub fn merge(mut self, other: Self) -> Self {
        self.backend = other.backend;
        if other.per_user_minute_limit != default_per_user_minute_limit() {
            self.per_user_minute_limit = other.per_user_minute_limit;
        }
        if other.per_user_day_limit != default_per_user_day_limit() {
            self.per_user_day_limit = other.per_user_day_limit;
        }
        if other.global_minute_limit != default_global_minute_limit() {
            self.global_minute_limit = other.global_minute_limit;
        }
        if other.global_day_limit != default_global_day_limit() {
            self.global_day_limit = other.global_day_limit;
        }
        self
    }
}

/// Counter backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuotaBackend {
    /// In-process token buckets (single gateway instance)
    #[default]
    Memory,
    /// Redis sorted-set counters (multiple gateway instances)
    Redis,
}

/// IP admission configuration for unauthenticated routes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpLimitConfig {
    /// Enable the IP admission limiter
    #[serde(default = "default_ip_limit_enabled")]
    pub enabled: bool,
    /// Requests per caller IP per minute
    #[serde(default = "default_ip_requests_per_minute")]
    pub requests_per_minute: u32,
}

impl Default for IpLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_ip_limit_enabled(),
            requests_per_minute: default_ip_requests_per_minute(),
        }
    }
}

fn default_per_user_minute_limit() -> u32 {
    20
}

fn default_per_user_day_limit() -> u32 {
    2000
}

fn default_global_minute_limit() -> u32 {
    95
}

fn default_global_day_limit() -> u32 {
    9950
}

fn default_upstream_minute_limit() -> u32 {
    100
}

fn default_upstream_day_limit() -> u32 {
    10000
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_idle_eviction_secs() -> u64 {
    3600
}

fn default_key_prefix() -> String {
    "fitrelay:quota:".to_string()
}

fn default_ip_limit_enabled() -> bool {
    true
}

fn default_ip_requests_per_minute() -> u32 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_config_defaults() {
        let config = QuotaConfig::default();
        assert_eq!(config.backend, QuotaBackend::Memory);
        assert_eq!(config.per_user_minute_limit, 20);
        assert_eq!(config.per_user_day_limit, 2000);
        assert_eq!(config.global_minute_limit, 95);
        assert_eq!(config.global_day_limit, 9950);
        assert_eq!(config.upstream_minute_limit, 100);
        assert_eq!(config.upstream_day_limit, 10000);
    }

    #[test]
    fn test_global_limits_below_upstream() {
        let config = QuotaConfig::default();
        assert!(config.global_minute_limit < config.upstream_minute_limit);
        assert!(config.global_day_limit < config.upstream_day_limit);
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(
            serde_json::to_string(&QuotaBackend::Memory).unwrap(),
            "\"memory\""
        );
        assert_eq!(
            serde_json::to_string(&QuotaBackend::Redis).unwrap(),
            "\"redis\""
        );
    }

    #[test]
    fn test_quota_config_deserialization_defaults() {
        let config: QuotaConfig = serde_yaml::from_str("backend: redis").unwrap();
        assert_eq!(config.backend, QuotaBackend::Redis);
        assert_eq!(config.per_user_minute_limit, 20);
        assert_eq!(config.key_prefix, "fitrelay:quota:");
    }

    #[test]
    fn test_quota_config_merge() {
        let base = QuotaConfig::default();
        let other = QuotaConfig {
            per_user_minute_limit: 5,
            ..Default::default()
        };
        let merged = base.merge(other);
        assert_eq!(merged.per_user_minute_limit, 5);
        assert_eq!(merged.global_day_limit, 9950);
    }

    #[test]
    fn test_ip_limit_defaults() {
        let config = IpLimitConfig::default();
        assert!(config.enabled);
        assert_eq!(config.requests_per_minute, 60);
    }
}
