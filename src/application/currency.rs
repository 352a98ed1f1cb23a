//! Exchange rate cache and currency conversion.
//!
//! The cache is the only thing on the payment-creation path that calls
//! out to the network. It never fails: a slow or broken FX feed degrades
//! to the configured default rate.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};

use crate::domain::payment::{convert_at, Currency, CurrencyAmounts, PaymentError};
use crate::ports::{RateSource, RateSourceError};

/// Cache settings.
#[derive(Debug, Clone)]
pub struct ExchangeRateCacheConfig {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
    pub default_rate: Decimal,
}

impl Default for ExchangeRateCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(4 * 60 * 60),
            fetch_timeout: Duration::from_secs(5),
            default_rate: Decimal::new(54000, 2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: Decimal,
    fetched_at: Instant,
}

/// Process-local rate cache with lazy refresh.
pub struct ExchangeRateCache {
    source: Arc<dyn RateSource>,
    config: ExchangeRateCacheConfig,
    entry: RwLock<Option<CachedRate>>,
    refresh: Mutex<()>,
}

impl ExchangeRateCache {
    pub fn new(source: Arc<dyn RateSource>, config: ExchangeRateCacheConfig) -> Self {
        Self {
            source,
            config,
            entry: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// Current rate: cached when fresh, fetched otherwise, default on failure.
    pub async fn get_rate(&self) -> Decimal {
        if let Some(rate) = self.fresh().await {
            return rate;
        }

        // One refresh at a time; latecomers reuse the winner's result.
        let _refresh = self.refresh.lock().await;
        if let Some(rate) = self.fresh().await {
            return rate;
        }

        match self.fetch().await {
            Ok(rate) => {
                *self.entry.write().await = Some(CachedRate {
                    rate,
                    fetched_at: Instant::now(),
                });
                tracing::debug!(%rate, "exchange rate refreshed");
                rate
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    default_rate = %self.config.default_rate,
                    "exchange rate fetch failed, using default rate"
                );
                self.config.default_rate
            }
        }
    }

    async fn fresh(&self) -> Option<Decimal> {
        let entry = *self.entry.read().await;
        entry
            .filter(|cached| cached.fetched_at.elapsed() < self.config.ttl)
            .map(|cached| cached.rate)
    }

    async fn fetch(&self) -> Result<Decimal, RateSourceError> {
        let rate = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_rate())
            .await
            .map_err(|_| RateSourceError::Timeout)??;

        if rate <= Decimal::ZERO {
            return Err(RateSourceError::Malformed(format!("non-positive rate {}", rate)));
        }
        Ok(rate)
    }
}

/// Converts amounts between the domestic and foreign currency.
#[derive(Clone)]
pub struct CurrencyConverter {
    cache: Arc<ExchangeRateCache>,
}

impl CurrencyConverter {
    pub fn new(cache: Arc<ExchangeRateCache>) -> Self {
        Self { cache }
    }

    pub async fn get_rate(&self) -> Decimal {
        self.cache.get_rate().await
    }

    /// Converts `amount`, rounded half-up to two places. Identity for equal currencies.
    pub async fn convert(
        &self,
        amount: Decimal,
        from: Currency,
        to: Currency,
    ) -> Result<Decimal, PaymentError> {
        if from == to {
            return Ok(amount);
        }
        convert_at(amount, from, to, self.cache.get_rate().await)
    }

    /// Converts between raw currency codes.
    pub async fn convert_codes(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
    ) -> Result<Decimal, PaymentError> {
        let from: Currency = from.parse()?;
        let to: Currency = to.parse()?;
        self.convert(amount, from, to).await
    }

    /// The amount in both currencies; the original stays in its own slot.
    pub async fn get_both_amounts(
        &self,
        amount: Decimal,
        currency: Currency,
    ) -> Result<CurrencyAmounts, PaymentError> {
        CurrencyAmounts::from_original(amount, currency, self.cache.get_rate().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        rate: Decimal,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateSource for CountingSource {
        async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rate)
        }
    }

    struct HangingSource;

    #[async_trait]
    impl RateSource for HangingSource {
        async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(dec!(1))
        }
    }

    fn counting(rate: Decimal) -> Arc<CountingSource> {
        Arc::new(CountingSource {
            rate,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn fresh_rate_is_served_from_cache() {
        let source = counting(dec!(512.34));
        let cache = ExchangeRateCache::new(source.clone(), ExchangeRateCacheConfig::default());

        assert_eq!(cache.get_rate().await, dec!(512.34));
        assert_eq!(cache.get_rate().await, dec!(512.34));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_rate_is_refetched() {
        let source = counting(dec!(512.34));
        let cache = ExchangeRateCache::new(
            source.clone(),
            ExchangeRateCacheConfig {
                ttl: Duration::ZERO,
                ..Default::default()
            },
        );

        cache.get_rate().await;
        cache.get_rate().await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_falls_back_to_default() {
        let cache = ExchangeRateCache::new(
            Arc::new(HangingSource),
            ExchangeRateCacheConfig {
                fetch_timeout: Duration::from_millis(20),
                ..Default::default()
            },
        );

        assert_eq!(cache.get_rate().await, dec!(540.00));
    }

    #[tokio::test]
    async fn non_positive_rate_is_rejected() {
        let cache = ExchangeRateCache::new(counting(dec!(0)), ExchangeRateCacheConfig::default());
        assert_eq!(cache.get_rate().await, dec!(540.00));
    }

    #[tokio::test]
    async fn convert_codes_rejects_unknown_currency() {
        let cache = Arc::new(ExchangeRateCache::new(
            counting(dec!(540)),
            ExchangeRateCacheConfig::default(),
        ));
        let converter = CurrencyConverter::new(cache);

        let err = converter.convert_codes(dec!(1), "CRC", "EUR").await.unwrap_err();
        assert_eq!(err, PaymentError::InvalidCurrency("EUR".to_string()));
        assert_eq!(
            converter.convert_codes(dec!(5400), "crc", "usd").await,
            Ok(dec!(10.00))
        );
    }

    #[tokio::test]
    async fn huge_amount_is_invalid_instead_of_panicking() {
        let cache = Arc::new(ExchangeRateCache::new(
            counting(dec!(540)),
            ExchangeRateCacheConfig::default(),
        ));
        let converter = CurrencyConverter::new(cache);

        assert_eq!(
            converter.get_both_amounts(Decimal::MAX, Currency::Foreign).await,
            Err(PaymentError::InvalidAmount(Decimal::MAX))
        );
        assert_eq!(
            converter.convert(Decimal::MAX, Currency::Foreign, Currency::Domestic).await,
            Err(PaymentError::InvalidAmount(Decimal::MAX))
        );
    }
}
