//! Exchange rate source port.

use async_trait::async_trait;
use rust_decimal::Decimal;

/// Error type for rate fetches. Callers degrade to a default rate.
#[derive(Debug, thiserror::Error)]
pub enum RateSourceError {
    #[error("Rate source timed out")]
    Timeout,

    #[error("Rate source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed rate response: {0}")]
    Malformed(String),
}

/// Port for foreign-exchange rate providers.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Domestic units per one foreign unit.
    async fn fetch_rate(&self) -> Result<Decimal, RateSourceError>;
}
