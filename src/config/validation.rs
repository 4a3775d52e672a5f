//! Configuration validation
//!
//! Validation logic for all configuration structures.

use crate::config::models::*;

/// Validation trait for configuration structures
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}

impl Validate for ServerConfig {
    fn validate(&self) -> Result<(), String> {
        if self.host.is_empty() {
            return Err("Server host must not be empty".to_string());
        }

        if self.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.max_body_size == 0 {
            return Err("Max body size must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for QuotaConfig {
    fn validate(&self) -> Result<(), String> {
        if self.per_user_minute_limit == 0 {
            return Err("Per-user minute limit must be greater than 0".to_string());
        }

        if self.per_user_day_limit == 0 {
            return Err("Per-user day limit must be greater than 0".to_string());
        }

        if self.global_minute_limit == 0 || self.global_day_limit == 0 {
            return Err("Global limits must be greater than 0".to_string());
        }

        if self.global_minute_limit > self.upstream_minute_limit {
            return Err(format!(
                "Global minute limit {} exceeds the upstream's published limit {}",
                self.global_minute_limit, self.upstream_minute_limit
            ));
        }

        if self.global_day_limit > self.upstream_day_limit {
            return Err(format!(
                "Global day limit {} exceeds the upstream's published limit {}",
                self.global_day_limit, self.upstream_day_limit
            ));
        }

        if self.sweep_interval_secs == 0 {
            return Err("Sweep interval must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for IpLimitConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.requests_per_minute == 0 {
            return Err("IP requests per minute must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for UpstreamConfig {
    fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Upstream base URL must not be empty".to_string());
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid upstream base URL: {}", e))?;

        if self.timeout == 0 {
            return Err("Upstream timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Validate for RedisConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.url.is_empty() {
            return Err("Redis URL must not be empty when Redis is enabled".to_string());
        }

        Ok(())
    }
}
