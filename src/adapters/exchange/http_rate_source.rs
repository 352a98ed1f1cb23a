//! Rate source reading `{"rates": {"<KEY>": <rate>}}` from a JSON feed.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ports::{RateSource, RateSourceError};

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: serde_json::Map<String, serde_json::Value>,
}

/// Fetches domestic units per foreign unit from a public rates endpoint.
pub struct HttpRateSource {
    url: String,
    rate_key: String,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(url: impl Into<String>, rate_key: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            rate_key: rate_key.into(),
            timeout,
            http_client: reqwest::Client::new(),
        }
    }
}

/// Extracts the rate for `key`, accepting numbers or numeric strings.
fn extract_rate(body: &str, key: &str) -> Result<Decimal, RateSourceError> {
    let parsed: RatesResponse =
        serde_json::from_str(body).map_err(|e| RateSourceError::Malformed(e.to_string()))?;

    let value = parsed
        .rates
        .get(key)
        .ok_or_else(|| RateSourceError::Malformed(format!("no rate for {}", key)))?;

    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => {
            return Err(RateSourceError::Malformed(format!(
                "rate for {} is not numeric: {}",
                key, other
            )))
        }
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| RateSourceError::Malformed(format!("rate {}: {}", text, e)))
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
        let response = self
            .http_client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RateSourceError::Timeout
                } else {
                    RateSourceError::Unavailable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RateSourceError::Unavailable(format!(
                "rate feed answered {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RateSourceError::Unavailable(e.to_string()))?;
        let rate = extract_rate(&body, &self.rate_key)?;
        tracing::debug!(url = %self.url, key = %self.rate_key, %rate, "fetched exchange rate");
        Ok(rate)
    }
}
