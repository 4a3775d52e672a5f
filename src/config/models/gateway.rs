//! Top-level gateway configuration

use super::*;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

/// Top-level gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Quota engine settings
    #[serde(default)]
    pub quota: QuotaConfig,
    /// IP admission settings for unauthenticated routes
    #[serde(default)]
    pub ip_limit: IpLimitConfig,
    /// Upstream wearable API settings
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,
}

impl GatewayConfig {
    /// Build configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("FITRELAY_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("FITRELAY_PORT") {
            if let Ok(port) = port.parse() {
                config.server.port = port;
            }
        }
        if let Ok(url) = std::env::var("FITRELAY_REDIS_URL") {
            config.storage.redis.url = url;
            config.storage.redis.enabled = true;
            config.quota.backend = QuotaBackend::Redis;
        }
        if let Ok(base_url) = std::env::var("FITRELAY_UPSTREAM_URL") {
            config.upstream.base_url = base_url;
        }

        Ok(config)
    }

    /// Merge with another configuration (other takes precedence)
    pub fn merge(mut self, other: Self) -> Self {
        self.server = self.server.merge(other.server);
        self.quota = self.quota.merge(other.quota);
        self.ip_limit = other.ip_limit;
        self.upstream = other.upstream;
        self.storage = other.storage;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_config_default() {
        let config = GatewayConfig::default();
        assert_eq!(config.quota.backend, QuotaBackend::Memory);
        assert!(!config.storage.redis.enabled);
    }

    #[test]
    fn test_gateway_config_empty_yaml() {
        let config: GatewayConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.quota.per_user_minute_limit, 20);
    }
}
