//! Configuration management for the relay
//!
//! This module handles loading, validation, and management of all gateway
//! configuration.

pub mod models;
pub mod validation;

pub use models::*;
pub use validation::Validate;

use crate::utils::error::{GatewayError, Result};
use std::path::Path;
use tracing::{debug, info};

/// Main configuration struct for the relay
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Gateway configuration
    pub gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {:?}", path);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| GatewayError::Config(format!("Failed to read config file: {}", e)))?;

        let gateway: GatewayConfig = serde_yaml::from_str(&content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse config: {}", e)))?;

        let config = Self { gateway };
        config.validate()?;

        debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading configuration from environment variables");

        let gateway = GatewayConfig::from_env()?;
        let config = Self { gateway };

        config.validate()?;
        Ok(config)
    }

    /// Get server configuration
    pub fn server(&self) -> &ServerConfig {
        &self.gateway.server
    }

    /// Get quota configuration
    pub fn quota(&self) -> &QuotaConfig {
        &self.gateway.quota
    }

    /// Get IP admission configuration
    pub fn ip_limit(&self) -> &IpLimitConfig {
        &self.gateway.ip_limit
    }

    /// Get upstream configuration
    pub fn upstream(&self) -> &UpstreamConfig {
        &self.gateway.upstream
    }

    /// Get storage configuration
    pub fn storage(&self) -> &StorageConfig {
        &self.gateway.storage
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        debug!("Validating configuration");

        self.gateway
            .server
            .validate()
            .map_err(|e| GatewayError::Config(format!("Server config error: {}", e)))?;

        self.gateway
            .quota
            .validate()
            .map_err(|e| GatewayError::Config(format!("Quota config error: {}", e)))?;

        self.gateway
            .ip_limit
            .validate()
            .map_err(|e| GatewayError::Config(format!("IP limit config error: {}", e)))?;

        self.gateway
            .upstream
            .validate()
            .map_err(|e| GatewayError::Config(format!("Upstream config error: {}", e)))?;

        self.gateway
            .storage
            .redis
            .validate()
            .map_err(|e| GatewayError::Config(format!("Redis config error: {}", e)))?;

        if self.gateway.quota.backend == QuotaBackend::Redis && !self.gateway.storage.redis.enabled
        {
            return Err(GatewayError::Config(
                "The redis quota backend requires storage.redis.enabled".to_string(),
            ));
        }

        debug!("Configuration validation completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_file_round_trip() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 9100
quota:
  backend: memory
  per_user_minute_limit: 10
upstream:
  base_url: "https://api.wearables.test"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        tokio::fs::write(&path, yaml).await.unwrap();

        let config = Config::from_file(&path).await.unwrap();
        assert_eq!(config.server().host, "127.0.0.1");
        assert_eq!(config.server().port, 9100);
        assert_eq!(config.quota().per_user_minute_limit, 10);
        // Untouched fields keep their defaults.
        assert_eq!(config.quota().per_user_day_limit, 2000);
        assert_eq!(config.upstream().base_url, "https://api.wearables.test");
    }

    #[tokio::test]
    async fn test_from_file_missing() {
        let err = Config::from_file("/nonexistent/gateway.yaml").await;
        assert!(err.is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_redis_backend_requires_redis_enabled() {
        let mut config = Config::default();
        config.gateway.quota.backend = QuotaBackend::Redis;
        assert!(config.validate().is_err());

        config.gateway.storage.redis.enabled = true;
        assert!(config.validate().is_ok());
    }
}
