//! Upstream wearable API configuration

use super::*;
use serde::{Deserialize, Serialize};

/// Upstream wearable API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the wearable provider's API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// User agent sent with relayed requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.wearable.example.com".to_string()
}

fn default_user_agent() -> String {
    format!("fitrelay-gateway/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_defaults() {
        let config = UpstreamConfig::default();
        assert_eq!(config.timeout, 30);
        assert!(config.user_agent.starts_with("fitrelay-gateway/"));
    }

    #[test]
    fn test_upstream_deserialization() {
        let config: UpstreamConfig =
            serde_yaml::from_str("base_url: \"https://api.vendor.test/v2\"").unwrap();
        assert_eq!(config.base_url, "https://api.vendor.test/v2");
        assert_eq!(config.timeout, 30);
    }
}
