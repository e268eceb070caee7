use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Alert feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertFeedConfig {
    /// NWS API root
    pub base_url: String,
    /// Postal code of the jurisdiction queried (`area=` parameter)
    pub area: String,
    /// State FIPS prefix an accepted region code must carry
    pub state_prefix: String,
    /// Cache TTL in seconds (default: 300 = 5 minutes)
    pub cache_ttl_sec: u64,
    /// Request timeout in seconds
    pub timeout_sec: u64,
    /// NWS rejects requests without a User-Agent
    pub user_agent: String,
}

impl Default for AlertFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weather.gov".to_string(),
            area: "GA".to_string(),
            state_prefix: "13".to_string(),
            cache_ttl_sec: 300,
            timeout_sec: 10,
            user_agent: concat!("community-resilience-index/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AlertFeedConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_sec)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    /// Active-alerts endpoint for the configured area
    pub fn alerts_url(&self) -> String {
        format!(
            "{}/alerts/active?area={}",
            self.base_url.trim_end_matches('/'),
            self.area
        )
    }
}
