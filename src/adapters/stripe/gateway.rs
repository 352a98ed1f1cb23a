//! Stripe-like card gateway over the payment intents API.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::ports::{
    GatewayError, GatewayErrorCode, IntentRequest, ProviderGateway, ProviderIntent,
    ProviderRefund, RefundRequest,
};

use super::wire::{to_minor_units, StripeErrorBody, StripePaymentIntent, StripeRefund};

pub(crate) const PROVIDER: &str = "stripe";

const DEFAULT_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,
    api_base_url: String,
    timeout: Duration,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Card gateway backed by Stripe payment intents.
///
/// Every mutating call sends an `Idempotency-Key` header, so re-issuing a
/// create for the same record returns the original intent.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        operation: &'static str,
    ) -> Result<T, GatewayError> {
        let response = request
            .basic_auth(self.config.api_key.expose_secret(), None::<&str>)
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(operation, error = %e, "Stripe request did not complete");
                GatewayError::from_transport(PROVIDER, &e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_body(status.as_u16(), &body);
            tracing::error!(
                operation,
                status = status.as_u16(),
                provider_code = ?err.provider_code,
                error = %err.message,
                "Stripe request failed"
            );
            return Err(err);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| GatewayError::malformed(PROVIDER, format!("Failed to parse Stripe response: {}", e)))
    }
}

/// Builds a gateway error from a non-2xx Stripe response body.
fn error_from_body(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<StripeErrorBody>(body) {
        Ok(parsed) => {
            let message = parsed
                .error
                .message
                .unwrap_or_else(|| format!("Stripe API error ({})", status));
            let err = GatewayError::from_status(PROVIDER, status, message);
            match parsed.error.code {
                Some(code) => err.with_provider_code(code),
                None => err,
            }
        }
        Err(_) => GatewayError::from_status(PROVIDER, status, format!("Stripe API error: {}", body)),
    }
}

fn intent_from_wire(intent: StripePaymentIntent) -> ProviderIntent {
    let status = intent.intent_status();
    ProviderIntent {
        external_id: intent.id,
        client_secret: intent.client_secret,
        status,
    }
}

#[async_trait]
impl ProviderGateway for StripeGateway {
    fn provider(&self) -> &'static str {
        PROVIDER
    }

    async fn create_intent(&self, request: IntentRequest) -> Result<ProviderIntent, GatewayError> {
        let amount = to_minor_units(request.amount, request.currency).ok_or_else(|| {
            GatewayError::new(
                PROVIDER,
                GatewayErrorCode::InvalidRequest,
                format!("amount {} out of range", request.amount),
            )
        })?;

        let mut params = vec![
            ("amount", amount.to_string()),
            ("currency", request.currency.code().to_lowercase()),
            ("description", request.description),
            ("payment_method_types[]", "card".to_string()),
            ("metadata[idempotency_key]", request.idempotency_key.clone()),
        ];
        if let Some(reference) = request.reference {
            params.push(("metadata[reference]", reference));
        }

        let intent: StripePaymentIntent = self
            .send(
                self.http_client
                    .post(self.url("/v1/payment_intents"))
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&params),
                "create_intent",
            )
            .await?;

        tracing::info!(intent_id = %intent.id, status = %intent.status, "Stripe payment intent created");
        Ok(intent_from_wire(intent))
    }

    async fn confirm(&self, external_id: &str) -> Result<ProviderIntent, GatewayError> {
        let intent: StripePaymentIntent = self
            .send(
                self.http_client
                    .get(self.url(&format!("/v1/payment_intents/{}", external_id))),
                "confirm",
            )
            .await?;

        if let Some(reason) = intent.failure_message() {
            tracing::debug!(intent_id = %intent.id, %reason, "Stripe intent carries a payment error");
        }
        Ok(intent_from_wire(intent))
    }

    async fn refund(&self, request: RefundRequest) -> Result<ProviderRefund, GatewayError> {
        let mut params = vec![("payment_intent", request.external_id.clone())];
        if let Some(amount) = request.amount {
            let minor = to_minor_units(amount, request.currency).ok_or_else(|| {
                GatewayError::new(
                    PROVIDER,
                    GatewayErrorCode::InvalidRequest,
                    format!("refund amount {} out of range", amount),
                )
            })?;
            params.push(("amount", minor.to_string()));
        }

        let refund: StripeRefund = self
            .send(
                self.http_client
                    .post(self.url("/v1/refunds"))
                    .header("Idempotency-Key", &request.idempotency_key)
                    .form(&params),
                "refund",
            )
            .await?;

        tracing::info!(refund_id = %refund.id, payment_intent = %request.external_id, "Stripe refund processed");
        Ok(ProviderRefund {
            refund_id: refund.id,
            status: refund.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::Currency;
    use rust_decimal_macros::dec;

    #[test]
    fn config_defaults_to_live_api() {
        let config = StripeConfig::new("sk_test_key");
        assert_eq!(config.api_base_url, "https://api.stripe.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_base_url_drops_trailing_slash() {
        let config = StripeConfig::new("key").with_base_url("http://localhost:12111/");
        assert_eq!(config.api_base_url, "http://localhost:12111");
    }

    #[test]
    fn card_decline_is_a_definite_failure() {
        let body = r#"{"error":{"message":"Your card was declined.","code":"card_declined","type":"card_error"}}"#;
        let err = error_from_body(402, body);

        assert_eq!(err.code, GatewayErrorCode::Declined);
        assert_eq!(err.provider_code.as_deref(), Some("card_declined"));
        assert_eq!(err.message, "Your card was declined.");
        assert!(!err.ambiguous);
    }

    #[test]
    fn server_error_is_ambiguous() {
        let err = error_from_body(502, "<html>bad gateway</html>");
        assert_eq!(err.code, GatewayErrorCode::ServerError);
        assert!(err.ambiguous);
        assert!(err.message.contains("bad gateway"));
    }

    #[tokio::test]
    async fn unreachable_host_is_definite() {
        let gateway = StripeGateway::new(
            StripeConfig::new("sk_test_key")
                .with_base_url("http://127.0.0.1:1")
                .with_timeout(Duration::from_secs(2)),
        );

        let err = gateway
            .create_intent(IntentRequest {
                amount: dec!(10.00),
                currency: Currency::Foreign,
                description: "Payment REF-1".into(),
                idempotency_key: "payment-1".into(),
                reference: Some("REF-1".into()),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, GatewayErrorCode::Unreachable);
        assert!(!err.ambiguous);
    }
}
