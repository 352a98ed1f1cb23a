//! Exchange-rate feed configuration

use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::ExchangeRateCacheConfig;

/// Exchange-rate feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Feed URL; the fixed default rate is used when absent
    pub source_url: Option<String>,

    /// Key of the domestic rate inside the feed's `rates` object
    #[serde(default = "default_rate_key")]
    pub rate_key: String,

    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Domestic units per foreign unit, used when the feed is unavailable
    #[serde(default = "default_rate")]
    pub default_rate: Decimal,
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_config(&self) -> ExchangeRateCacheConfig {
        ExchangeRateCacheConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            fetch_timeout: self.timeout(),
            default_rate: self.default_rate,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(url) = &self.source_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ValidationError::InvalidUrl("EXCHANGE__SOURCE_URL"));
            }
        }
        if self.default_rate <= Decimal::ZERO {
            return Err(ValidationError::InvalidExchangeRate);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            source_url: None,
            rate_key: default_rate_key(),
            ttl_secs: default_ttl(),
            timeout_secs: default_timeout(),
            default_rate: default_rate(),
        }
    }
}

fn default_rate_key() -> String {
    "CRC".to_string()
}

fn default_ttl() -> u64 {
    14_400
}

fn default_timeout() -> u64 {
    5
}

fn default_rate() -> Decimal {
    Decimal::new(54000, 2)
}
