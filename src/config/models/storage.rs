//! Storage configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis URL
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Enable Redis (required for the distributed quota backend)
    #[serde(default)]
    pub enabled: bool,
    /// Maximum connections
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            enabled: false,
            max_connections: default_redis_max_connections(),
            connection_timeout: default_connection_timeout(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://127.0.0.1:6379");
        assert!(!config.enabled);
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_storage_config_deserialization() {
        let config: StorageConfig = serde_yaml::from_str(
            r#"
redis:
  url: "redis://cache.internal:6380"
  enabled: true
"#,
        )
        .unwrap();
        assert!(config.redis.enabled);
        assert_eq!(config.redis.url, "redis://cache.internal:6380");
    }
}
