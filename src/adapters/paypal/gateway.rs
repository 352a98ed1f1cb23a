//! PayPal-like gateway over the v2 orders API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::ports::{
    GatewayError, IntentRequest, ProviderGateway, ProviderIntent, ProviderRefund, RefundRequest,
};

use super::wire::{
    CreateOrder, Money, Order, PayPalErrorBody, PurchaseUnitRequest, RefundBody, RefundResponse,
    TokenResponse,
};

pub(crate) const PROVIDER: &str = "paypal";

const SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";
const LIVE_BASE_URL: &str = "https://api-m.paypal.com";

/// Tokens are refreshed this long before PayPal says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct PayPalConfig {
    client_id: String,
    client_secret: SecretString,
    api_base_url: String,
    timeout: Duration,
}

impl PayPalConfig {
    /// Sandbox or live endpoints depending on `sandbox`.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>, sandbox: bool) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            api_base_url: if sandbox { SANDBOX_BASE_URL } else { LIVE_BASE_URL }.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

struct CachedToken {
    token: SecretString,
    expires_at: Instant,
}

/// Orders-based gateway. The approval link is returned as the client handle.
pub struct PayPalGateway {
    config: PayPalConfig,
    http_client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl PayPalGateway {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    /// Returns a cached OAuth token, fetching a new one when it is close to expiry.
    async fn access_token(&self) -> Result<SecretString, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(entry) = cached.as_ref() {
            if Instant::now() < entry.expires_at {
                return Ok(entry.token.clone());
            }
        }

        let response = self
            .http_client
            .post(self.url("/v1/oauth2/token"))
            .basic_auth(&self.config.client_id, Some(self.config.client_secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| GatewayError::from_transport(PROVIDER, &e))?;

        let token: TokenResponse = read_response(response, "oauth_token").await?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let secret = SecretString::new(token.access_token);
        *cached = Some(CachedToken {
            token: secret.clone(),
            expires_at: Instant::now() + lifetime,
        });
        tracing::debug!(expires_in = token.expires_in, "PayPal access token refreshed");
        Ok(secret)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, GatewayError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token.expose_secret())
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "PayPal request did not complete");
                GatewayError::from_transport(PROVIDER, &e)
            })?;
        read_response(response, operation).await
    }

    async fn get_order(&self, order_id: &str) -> Result<Order, GatewayError> {
        self.send(
            self.http_client
                .get(self.url(&format!("/v2/checkout/orders/{}", order_id))),
            "get_order",
        )
        .await
    }
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let err = error_from_body(status.as_u16(), &body);
        tracing::error!(
            operation,
            status = status.as_u16(),
            provider_code = ?err.provider_code,
            error = %err.message,
            "PayPal request failed"
        );
        return Err(err);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::malformed(PROVIDER, format!("Failed to parse PayPal response: {}", e)))
}

fn error_from_body(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<PayPalErrorBody>(body) {
        Ok(parsed) => {
            let detail = parsed
                .details
                .first()
                .and_then(|d| d.description.clone().or_else(|| d.issue.clone()));
            let message = detail
                .or(parsed.message)
                .unwrap_or_else(|| format!("PayPal API error ({})", status));
            let issue = parsed
                .details
                .first()
                .and_then(|d| d.issue.clone())
                .or(parsed.name);
            let err = GatewayError::from_status(PROVIDER, status, message);
            match issue {
                Some(code) => err.with_provider_code(code),
                None => err,
            }
        }
        Err(_) => GatewayError::from_status(PROVIDER, status, format!("PayPal API error: {}", body)),
    }
}

#[async_trait]
impl ProviderGateway for PayPalGateway {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<ProviderIntent, GatewayError> {
        let body = CreateOrder {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnitRequest {
                reference_id: request.idempotency_key.clone(),
                custom_id: request.reference,
                description: request.description,
                amount: Money::new(request.amount, request.currency),
            }],
        };

        let order: Order = self
            .send(
                self.http_client
                    .post(self.url("/v2/checkout/orders"))
                    .header("PayPal-Request-Id", &request.idempotency_key)
                    .json(&body),
                "create_order",
            )
            .await?;

        tracing::info!(order_id = %order.id, status = %order.status, "PayPal order created");
        Ok(ProviderIntent {
            client_secret: order.approval_url(),
            status: order.intent_status(),
            external_id: order.id,
        })
    }

    async fn confirm(&self, external_id: &str) -> Result<ProviderIntent, GatewayError> {
        let order = self.get_order(external_id).await?;
        Ok(ProviderIntent {
            client_secret: order.approval_url(),
            status: order.intent_status(),
            external_id: order.id,
        })
    }

    async fn refund(&self, request: RefundRequest) -> Result<ProviderRefund, GatewayError> {
        // Refunds act on the capture, not the order the record references.
        let order = self.get_order(&request.external_id).await?;
        let capture_id = order
            .first_capture_id()
            .unwrap_or(&request.external_id)
            .to_string();

        let body = RefundBody {
            amount: request.amount.map(|a| Money::new(a, request.currency)),
        };
        let refund: RefundResponse = self
            .send(
                self.http_client
                    .post(self.url(&format!("/v2/payments/captures/{}/refund", capture_id)))
                    .header("PayPal-Request-Id", &request.idempotency_key)
                    .json(&body),
                "refund",
            )
            .await?;

        tracing::info!(refund_id = %refund.id, %capture_id, "PayPal refund processed");
        Ok(ProviderRefund {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}
