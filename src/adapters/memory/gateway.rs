//! Scriptable provider gateway for tests and local runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::ports::{
    GatewayError, IntentRequest, IntentStatus, ProviderGateway, ProviderIntent, ProviderRefund,
    RefundRequest,
};

/// Recorded call for assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    CreateIntent(IntentRequest),
    Confirm(String),
    Refund(RefundRequest),
}

/// Mock gateway.
///
/// Succeeds by default with ids `mock_pi_<n>`. Queue errors or intent
/// statuses to script failures; add a delay to simulate a slow provider.
/// A repeated idempotency key returns the intent first created for it.
pub struct MockGateway {
    name: &'static str,
    counter: AtomicUsize,
    state: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    create_results: VecDeque<Result<IntentStatus, GatewayError>>,
    confirm_status: Option<IntentStatus>,
    refund_error: Option<GatewayError>,
    delay: Option<Duration>,
    calls: Vec<GatewayCall>,
    intents_by_key: HashMap<String, ProviderIntent>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new("mock")
    }
}

impl MockGateway {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            counter: AtomicUsize::new(0),
            state: Mutex::new(MockState::default()),
        }
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Next `create_intent` fails with `error`.
    pub async fn fail_next_create(&self, error: GatewayError) {
        self.state.lock().await.create_results.push_back(Err(error));
    }

    /// Next `create_intent` returns an intent in `status`.
    pub async fn next_create_status(&self, status: IntentStatus) {
        self.state.lock().await.create_results.push_back(Ok(status));
    }

    /// Status reported by `confirm` (defaults to `Succeeded`).
    pub async fn set_confirm_status(&self, status: IntentStatus) {
        self.state.lock().await.confirm_status = Some(status);
    }

    pub async fn fail_refunds(&self, error: GatewayError) {
        self.state.lock().await.refund_error = Some(error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn create_intent_calls(&self) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| matches!(c, GatewayCall::CreateIntent(_)))
            .count()
    }

    async fn pause(&self) {
        let delay = self.state.lock().await.delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl ProviderGateway for MockGateway {
    fn provider(&self) -> &'static str {
        self.name
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<ProviderIntent, GatewayError> {
        let key = request.idempotency_key.clone();
        let scripted = {
            let mut state = self.state.lock().await;
            state.calls.push(GatewayCall::CreateIntent(request));
            if let Some(existing) = state.intents_by_key.get(&key) {
                return Ok(existing.clone());
            }
            state.create_results.pop_front()
        };
        self.pause().await;

        let status = scripted.unwrap_or(Ok(IntentStatus::Succeeded))?;
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let intent = ProviderIntent {
            external_id: format!("mock_pi_{}", n),
            client_secret: Some(format!("mock_pi_{}_secret", n)),
            status,
        };
        self.state
            .lock()
            .await
            .intents_by_key
            .insert(key, intent.clone());
        Ok(intent)
    }

    async fn confirm(&self, external_id: &str) -> Result<ProviderIntent, GatewayError> {
        let status = {
            let mut state = self.state.lock().await;
            state.calls.push(GatewayCall::Confirm(external_id.to_string()));
            state.confirm_status.unwrap_or(IntentStatus::Succeeded)
        };
        Ok(ProviderIntent {
            external_id: external_id.to_string(),
            client_secret: None,
            status,
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<ProviderRefund, GatewayError> {
        let mut state = self.state.lock().await;
        state.calls.push(GatewayCall::Refund(request.clone()));
        if let Some(err) = state.refund_error.clone() {
            return Err(err);
        }
        Ok(ProviderRefund {
            refund_id: format!("mock_re_{}", request.external_id),
            status: "succeeded".to_string(),
        })
    }
}
