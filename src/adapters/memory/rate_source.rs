//! Rate sources for tests and offline runs.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::ports::{RateSource, RateSourceError};

/// Always returns the same rate.
pub struct FixedRateSource(pub Decimal);

#[async_trait]
impl RateSource for FixedRateSource {
    async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
        Ok(self.0)
    }
}

/// Always fails the way a timed-out feed does.
pub struct FailingRateSource;

#[async_trait]
impl RateSource for FailingRateSource {
    async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
        Err(RateSourceError::Timeout)
    }
}
