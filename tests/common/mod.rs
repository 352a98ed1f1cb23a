//! Shared wiring for integration tests.
//!
//! Builds the full settlement stack on in-memory adapters with real
//! webhook verifiers, so tests drive it exactly as the service does.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use sha2::Sha256;

use park_payments::adapters::memory::{
    FixedRateSource, InMemoryNotificationSink, InMemorySettlementRepository, MockGateway,
    RecordingAuditSink, RecordingEnrollmentNotifier,
};
use park_payments::adapters::{PayPalWebhookVerifier, PaymentAppState, StripeWebhookVerifier};
use park_payments::application::handlers::payment::{
    ReconcileWebhookCommand, ReconciliationSweeper, SweepConfig, WebhookReconciler,
};
use park_payments::application::{
    CurrencyConverter, ExchangeRateCache, ExchangeRateCacheConfig, RecordLocks,
    SettlementEffects, StatusWriter,
};
use park_payments::domain::payment::{Donation, PaymentRecord};
use park_payments::ports::RateSource;

pub const STRIPE_SECRET: &str = "whsec_integration";
pub const PAYPAL_SECRET: &str = "paypal_integration";

pub struct TestApp {
    pub payments: Arc<InMemorySettlementRepository<PaymentRecord>>,
    pub donations: Arc<InMemorySettlementRepository<Donation>>,
    pub gateway: Arc<MockGateway>,
    pub notifications: Arc<InMemoryNotificationSink>,
    pub enrollments: Arc<RecordingEnrollmentNotifier>,
    pub audit: Arc<RecordingAuditSink>,
    pub state: PaymentAppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_rate_source(Arc::new(FixedRateSource(dec!(540.00))))
    }

    pub fn with_rate_source(source: Arc<dyn RateSource>) -> Self {
        let payments = Arc::new(InMemorySettlementRepository::<PaymentRecord>::new());
        let donations = Arc::new(InMemorySettlementRepository::<Donation>::new());
        let gateway = Arc::new(MockGateway::new("stripe"));
        let notifications = Arc::new(InMemoryNotificationSink::new());
        let enrollments = Arc::new(RecordingEnrollmentNotifier::new());
        let audit = Arc::new(RecordingAuditSink::new());

        let effects = SettlementEffects {
            notifications: notifications.clone(),
            enrollments: enrollments.clone(),
            audit: audit.clone(),
        };
        let locks = Arc::new(RecordLocks::new());
        let converter = CurrencyConverter::new(Arc::new(ExchangeRateCache::new(
            source,
            ExchangeRateCacheConfig {
                fetch_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        )));

        let reconciler = WebhookReconciler::new(
            StatusWriter::new(payments.clone(), effects.clone()),
            StatusWriter::new(donations.clone(), effects.clone()),
            locks.clone(),
        )
        .with_verifier(Arc::new(StripeWebhookVerifier::new(STRIPE_SECRET)))
        .with_verifier(Arc::new(PayPalWebhookVerifier::new(PAYPAL_SECRET)));

        let state = PaymentAppState {
            payments: payments.clone(),
            donations: donations.clone(),
            gateway: gateway.clone(),
            converter,
            effects,
            locks,
            reconciler: Arc::new(reconciler),
        };

        Self {
            payments,
            donations,
            gateway,
            notifications,
            enrollments,
            audit,
            state,
        }
    }

    pub fn sweeper(&self, stuck_after: Duration) -> ReconciliationSweeper {
        ReconciliationSweeper::new(
            self.state.payment_writer(),
            self.state.donation_writer(),
            self.state.gateway.clone(),
            self.state.locks.clone(),
            SweepConfig {
                stuck_after,
                ..Default::default()
            },
        )
    }

    /// Signed Stripe delivery for `event_type` on intent `intent_id`.
    pub fn stripe_webhook(&self, event_type: &str, intent_id: &str) -> ReconcileWebhookCommand {
        signed_stripe(stripe_event(event_type, intent_id))
    }

    /// Signed Stripe delivery whose intent carries `metadata[reference]`.
    pub fn stripe_webhook_with_reference(
        &self,
        event_type: &str,
        intent_id: &str,
        reference: &str,
    ) -> ReconcileWebhookCommand {
        let mut event: serde_json::Value =
            serde_json::from_slice(&stripe_event(event_type, intent_id)).unwrap();
        event["data"]["object"]["metadata"] = json!({ "reference": reference });
        signed_stripe(event.to_string().into_bytes())
    }
}

fn signed_stripe(payload: Vec<u8>) -> ReconcileWebhookCommand {
    let signature = stripe_signature(&payload);
    ReconcileWebhookCommand {
        provider: "stripe".to_string(),
        payload,
        signature,
    }
}

pub fn stripe_event(event_type: &str, intent_id: &str) -> Vec<u8> {
    json!({
        "id": format!("evt_{}", uuid::Uuid::new_v4().simple()),
        "type": event_type,
        "livemode": false,
        "data": {
            "object": {
                "id": intent_id,
                "status": if event_type == "payment_intent.succeeded" { "succeeded" } else { "requires_payment_method" },
                "client_secret": null,
                "last_payment_error": null
            }
        }
    })
    .to_string()
    .into_bytes()
}

/// `Stripe-Signature` header value for `payload`, timestamped now.
pub fn stripe_signature(payload: &[u8]) -> String {
    let timestamp = chrono::Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(STRIPE_SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// `Paypal-Transmission-Sig` header value for `payload`.
pub fn paypal_signature(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(PAYPAL_SECRET.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

pub fn money(value: i64, scale: u32) -> Decimal {
    Decimal::new(value, scale)
}
