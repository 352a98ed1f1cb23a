//! Concurrency and deadline limits around any provider gateway.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::ports::{
    GatewayError, GatewayErrorCode, IntentRequest, ProviderGateway, ProviderIntent,
    ProviderRefund, RefundRequest,
};

/// Caps in-flight provider calls and bounds how long each may take.
///
/// Waiting too long for a permit fails definitely: the request was never
/// sent. A call that outlives `call_timeout` is ambiguous.
pub struct BoundedGateway {
    inner: Arc<dyn ProviderGateway>,
    permits: Arc<Semaphore>,
    call_timeout: Duration,
    queue_timeout: Duration,
}

impl BoundedGateway {
    pub fn new(inner: Arc<dyn ProviderGateway>, max_concurrent_calls: usize, call_timeout: Duration) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
            call_timeout,
            queue_timeout: call_timeout,
        }
    }

    pub fn with_queue_timeout(mut self, timeout: Duration) -> Self {
        self.queue_timeout = timeout;
        self
    }

    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    async fn guarded<T, F>(&self, operation: &'static str, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>> + Send,
    {
        let provider = self.inner.provider();
        let _permit = tokio::time::timeout(self.queue_timeout, self.permits.acquire())
            .await
            .map_err(|_| {
                tracing::warn!(provider, operation, "provider worker pool saturated");
                GatewayError::new(
                    provider,
                    GatewayErrorCode::Unreachable,
                    "no provider worker available",
                )
            })?
            .map_err(|_| GatewayError::unreachable(provider, "provider worker pool closed"))?;

        tokio::time::timeout(self.call_timeout, call)
            .await
            .map_err(|_| {
                tracing::warn!(
                    provider,
                    operation,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "provider call timed out"
                );
                GatewayError::timeout(provider, format!("{} timed out", operation))
            })?
    }
}

#[async_trait]
impl ProviderGateway for BoundedGateway {
    fn provider(&self) -> &'static str {
        self.inner.provider()
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<ProviderIntent, GatewayError> {
        self.guarded("create_intent", self.inner.create_intent(request))
            .await
    }

    async fn confirm(&self, external_id: &str) -> Result<ProviderIntent, GatewayError> {
        self.guarded("confirm", self.inner.confirm(external_id)).await
    }

    async fn refund(&self, request: RefundRequest) -> Result<ProviderRefund, GatewayError> {
        self.guarded("refund", self.inner.refund(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MockGateway;
    use crate::domain::payment::Currency;
    use rust_decimal_macros::dec;

    fn request(key: &str) -> IntentRequest {
        IntentRequest {
            amount: dec!(25.00),
            currency: Currency::Foreign,
            description: "Payment REF".into(),
            idempotency_key: key.into(),
            reference: None,
        }
    }

    #[tokio::test]
    async fn passes_calls_through() {
        let mock = Arc::new(MockGateway::new("mock"));
        let gateway = BoundedGateway::new(mock.clone(), 4, Duration::from_secs(1));

        let intent = gateway.create_intent(request("k1")).await.unwrap();

        assert_eq!(intent.external_id, "mock_pi_1");
        assert_eq!(gateway.provider(), "mock");
        assert_eq!(gateway.available_permits(), 4);
    }

    #[tokio::test]
    async fn slow_call_times_out_ambiguously() {
        let mock = Arc::new(MockGateway::new("mock"));
        mock.set_delay(Duration::from_millis(500)).await;
        let gateway = BoundedGateway::new(mock, 1, Duration::from_millis(50));

        let err = gateway.create_intent(request("k1")).await.unwrap_err();

        assert_eq!(err.code, GatewayErrorCode::Timeout);
        assert!(err.ambiguous);
    }

    #[tokio::test]
    async fn saturated_pool_fails_definitely() {
        let mock = Arc::new(MockGateway::new("mock"));
        mock.set_delay(Duration::from_millis(300)).await;
        let gateway = BoundedGateway::new(mock.clone(), 1, Duration::from_secs(2))
            .with_queue_timeout(Duration::from_millis(50));

        let (first, second) = tokio::join!(
            gateway.create_intent(request("k1")),
            gateway.create_intent(request("k2")),
        );

        assert!(first.is_ok());
        let err = second.unwrap_err();
        assert_eq!(err.code, GatewayErrorCode::Unreachable);
        assert!(!err.ambiguous);
        assert_eq!(mock.create_intent_calls().await, 1);
    }
}
