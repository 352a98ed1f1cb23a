//! End-to-end settlement flows on the in-memory stack.
//!
//! Covers creation, synchronous processing, webhook reconciliation, the
//! sweep and the enrollment cascade through the public crate API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use park_payments::adapters::memory::GatewayCall;
use park_payments::application::handlers::payment::{
    CreateDonationCommand, CreatePaymentCommand, ReconcileResult, RefundCommand,
};
use park_payments::domain::foundation::EnrollmentId;
use park_payments::domain::payment::{
    Actor, Currency, EnrollmentOutcome, NotificationKind, PaymentError, PaymentMethod,
    PaymentRecord, PaymentStatus,
};
use park_payments::ports::{GatewayError, RateSource, RateSourceError, SettlementRepository};

use common::TestApp;

fn payment_command(amount: Decimal, currency: Currency, reference: &str) -> CreatePaymentCommand {
    CreatePaymentCommand {
        amount,
        currency,
        method: PaymentMethod::Card,
        reference: Some(reference.to_string()),
        enrollment_id: None,
        notes: None,
        receipt_ref: None,
    }
}

async fn create_payment(app: &TestApp, reference: &str) -> PaymentRecord {
    app.state
        .create_payment_handler()
        .handle(payment_command(dec!(100.00), Currency::Domestic, reference))
        .await
        .unwrap()
}

// ════════════════════════════════════════════════════════════════════════════════
// Creation and processing
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn creation_fixes_both_amounts_and_starts_pending() {
    let app = TestApp::new();

    let payment = create_payment(&app, "ref-a").await;

    assert_eq!(payment.amount_domestic, dec!(100.00));
    assert_eq!(payment.amount_foreign, dec!(0.19));
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert!(app.notifications.delivered().await.is_empty());
}

#[tokio::test]
async fn processing_settles_and_replaces_reference() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-b").await;

    let outcome = app
        .state
        .payment_processor()
        .process(&payment.id)
        .await
        .unwrap();

    assert_eq!(outcome.record.status, PaymentStatus::Success);
    assert_eq!(outcome.record.provider_reference, "mock_pi_1");
    assert_eq!(outcome.client_secret.as_deref(), Some("mock_pi_1_secret"));

    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);

    let delivered = app.notifications.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Success);
    assert_eq!(delivered[0].correlated_id, payment.id.to_string());
}

#[tokio::test]
async fn second_process_is_rejected_without_calling_provider() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-d").await;
    let processor = app.state.payment_processor();
    processor.process(&payment.id).await.unwrap();

    let err = processor.process(&payment.id).await.unwrap_err();

    assert_eq!(err, PaymentError::AlreadyProcessed(PaymentStatus::Success));
    assert_eq!(app.gateway.create_intent_calls().await, 1);
}

#[tokio::test]
async fn definite_decline_fails_the_record() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-decline").await;
    app.gateway
        .fail_next_create(GatewayError::from_status("stripe", 402, "card_declined"))
        .await;

    let err = app.state.payment_processor().process(&payment.id).await.unwrap_err();

    assert!(matches!(err, PaymentError::Provider { .. }));
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Failed);
    let delivered = app.notifications.delivered().await;
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].kind, NotificationKind::Error);
}

#[tokio::test]
async fn ambiguous_outcome_leaves_record_processing() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-timeout").await;
    app.gateway
        .fail_next_create(GatewayError::timeout("stripe", "read timed out"))
        .await;

    let err = app.state.payment_processor().process(&payment.id).await.unwrap_err();

    assert!(matches!(err, PaymentError::Provider { .. }));
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Processing);
    assert!(app.notifications.delivered().await.is_empty());
}

#[tokio::test]
async fn webhook_settles_record_left_processing_by_timeout() {
    let app = TestApp::new();
    let enrollment_id = EnrollmentId::new();
    let payment = app
        .state
        .create_payment_handler()
        .handle(CreatePaymentCommand {
            enrollment_id: Some(enrollment_id),
            ..payment_command(dec!(25.00), Currency::Foreign, "ref-lost-response")
        })
        .await
        .unwrap();
    app.gateway
        .fail_next_create(GatewayError::timeout("stripe", "read timed out"))
        .await;
    app.state.payment_processor().process(&payment.id).await.unwrap_err();

    match &app.gateway.calls().await[0] {
        GatewayCall::CreateIntent(request) => {
            assert_eq!(request.reference.as_deref(), Some("ref-lost-response"))
        }
        other => panic!("unexpected call {:?}", other),
    }

    let result = app
        .state
        .reconciler
        .reconcile(app.stripe_webhook_with_reference(
            "payment_intent.succeeded",
            "pi_3LostResponse",
            "ref-lost-response",
        ))
        .await
        .unwrap();

    assert!(matches!(result, ReconcileResult::Applied { status: PaymentStatus::Success, .. }));
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(stored.provider_reference, "pi_3LostResponse");
    assert_eq!(
        app.enrollments.outcomes().await,
        vec![(enrollment_id, EnrollmentOutcome::Paid)]
    );
}

#[tokio::test]
async fn duplicate_reference_is_rejected() {
    let app = TestApp::new();
    create_payment(&app, "ref-dup").await;

    let err = app
        .state
        .create_payment_handler()
        .handle(payment_command(dec!(5.00), Currency::Foreign, "ref-dup"))
        .await
        .unwrap_err();

    assert_eq!(err, PaymentError::DuplicateReference("ref-dup".to_string()));
    assert_eq!(app.payments.len().await, 1);
}

#[tokio::test]
async fn non_positive_amount_is_rejected() {
    let app = TestApp::new();

    let err = app
        .state
        .create_payment_handler()
        .handle(payment_command(dec!(0), Currency::Domestic, "ref-zero"))
        .await
        .unwrap_err();

    assert_eq!(err, PaymentError::InvalidAmount(dec!(0)));
}

// ════════════════════════════════════════════════════════════════════════════════
// Exchange-rate fallback
// ════════════════════════════════════════════════════════════════════════════════

struct HangingRateSource;

#[async_trait]
impl RateSource for HangingRateSource {
    async fn fetch_rate(&self) -> Result<Decimal, RateSourceError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(dec!(1.00))
    }
}

#[tokio::test]
async fn slow_rate_feed_degrades_to_default_rate() {
    let app = TestApp::with_rate_source(Arc::new(HangingRateSource));

    let rate = app.state.converter.get_rate().await;
    assert_eq!(rate, dec!(540.00));

    // Creation still succeeds on the fallback rate.
    let payment = app
        .state
        .create_payment_handler()
        .handle(payment_command(dec!(10.00), Currency::Foreign, "ref-fx"))
        .await
        .unwrap();
    assert_eq!(payment.amount_domestic, dec!(5400.00));
    assert_eq!(payment.amount_foreign, dec!(10.00));
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook reconciliation
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn failed_event_for_unknown_reference_is_acknowledged() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-known").await;

    let result = app
        .state
        .reconciler
        .reconcile(app.stripe_webhook("payment_intent.payment_failed", "pi_nobody"))
        .await
        .unwrap();

    assert_eq!(
        result,
        ReconcileResult::Unmatched {
            reference: "pi_nobody".to_string()
        }
    );
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
    assert!(app.audit.events().await.is_empty());
}

#[tokio::test]
async fn repeated_success_event_cascades_once() {
    let app = TestApp::new();
    let enrollment_id = EnrollmentId::new();
    let payment = app
        .state
        .create_payment_handler()
        .handle(CreatePaymentCommand {
            enrollment_id: Some(enrollment_id),
            ..payment_command(dec!(25.00), Currency::Foreign, "pi_enroll")
        })
        .await
        .unwrap();

    let first = app
        .state
        .reconciler
        .reconcile(app.stripe_webhook("payment_intent.succeeded", "pi_enroll"))
        .await
        .unwrap();
    let second = app
        .state
        .reconciler
        .reconcile(app.stripe_webhook("payment_intent.succeeded", "pi_enroll"))
        .await
        .unwrap();

    assert!(matches!(first, ReconcileResult::Applied { status: PaymentStatus::Success, .. }));
    assert!(matches!(second, ReconcileResult::AlreadyApplied { .. }));

    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(
        app.enrollments.outcomes().await,
        vec![(enrollment_id, EnrollmentOutcome::Paid)]
    );
    let successes = app
        .notifications
        .delivered()
        .await
        .into_iter()
        .filter(|n| n.kind == NotificationKind::Success)
        .count();
    assert_eq!(successes, 1);
}

#[tokio::test]
async fn tampered_webhook_is_rejected_before_lookup() {
    let app = TestApp::new();
    create_payment(&app, "pi_tamper").await;

    let mut cmd = app.stripe_webhook("payment_intent.succeeded", "pi_tamper");
    cmd.payload = common::stripe_event("payment_intent.succeeded", "pi_other");

    let err = app.state.reconciler.reconcile(cmd).await.unwrap_err();

    assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    assert!(app.audit.events().await.is_empty());
}

#[tokio::test]
async fn concurrent_process_and_webhook_cascade_once() {
    let app = TestApp::new();
    let enrollment_id = EnrollmentId::new();
    let payment = app
        .state
        .create_payment_handler()
        .handle(CreatePaymentCommand {
            enrollment_id: Some(enrollment_id),
            ..payment_command(dec!(100.00), Currency::Domestic, "pi_race")
        })
        .await
        .unwrap();
    app.gateway.set_delay(Duration::from_millis(50)).await;

    let processor = app.state.payment_processor();
    let reconciler = app.state.reconciler.clone();
    let webhook = app.stripe_webhook("payment_intent.succeeded", "pi_race");

    let (processed, reconciled) = tokio::join!(
        processor.process(&payment.id),
        reconciler.reconcile(webhook),
    );

    // Whichever path won, the other must have observed the settled record.
    assert!(matches!(
        processed,
        Ok(_) | Err(PaymentError::AlreadyProcessed(PaymentStatus::Success))
    ));
    assert!(reconciled.is_ok());

    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(
        app.enrollments.outcomes().await,
        vec![(enrollment_id, EnrollmentOutcome::Paid)]
    );
}

// ════════════════════════════════════════════════════════════════════════════════
// Donations, refunds and operator actions
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn donation_is_processed_without_cascade() {
    let app = TestApp::new();
    let donation = app
        .state
        .create_donation_handler()
        .handle(CreateDonationCommand {
            donor_name: Some("Ana".to_string()),
            donor_email: Some("ana@example.org".to_string()),
            amount: dec!(20.00),
            currency: Currency::Foreign,
            method: PaymentMethod::Wallet,
            reference: None,
            notes: None,
        })
        .await
        .unwrap();

    let outcome = app.state.donation_processor().process(&donation.id).await.unwrap();

    assert_eq!(outcome.record.status, PaymentStatus::Success);
    assert!(app.enrollments.outcomes().await.is_empty());
    let calls = app.gateway.calls().await;
    assert!(matches!(
        &calls[0],
        GatewayCall::CreateIntent(request) if request.description.contains("Ana")
    ));
}

#[tokio::test]
async fn refund_moves_settled_payment_to_refunded() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-refund").await;
    app.state.payment_processor().process(&payment.id).await.unwrap();

    let result = app
        .state
        .refund_handler()
        .handle(RefundCommand {
            id: payment.id,
            amount: None,
            actor: Actor::Operator("maria".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(result.record.status, PaymentStatus::Refunded);
    let last = app.notifications.delivered().await.pop().unwrap();
    assert_eq!(last.kind, NotificationKind::Info);
    assert_eq!(last.title, "Refund processed");
}

#[tokio::test]
async fn operator_force_fail_releases_enrollment() {
    let app = TestApp::new();
    let enrollment_id = EnrollmentId::new();
    let payment = app
        .state
        .create_payment_handler()
        .handle(CreatePaymentCommand {
            enrollment_id: Some(enrollment_id),
            ..payment_command(dec!(100.00), Currency::Domestic, "ref-stuck")
        })
        .await
        .unwrap();
    app.gateway
        .fail_next_create(GatewayError::timeout("stripe", "no response"))
        .await;
    let _ = app.state.payment_processor().process(&payment.id).await;

    let failed = app
        .state
        .force_fail_handler()
        .handle(&payment.id, "maria", Some("customer abandoned checkout"))
        .await
        .unwrap();

    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(
        app.enrollments.outcomes().await,
        vec![(enrollment_id, EnrollmentOutcome::Unpaid)]
    );
    let actors: Vec<Actor> = app.audit.events().await.into_iter().map(|e| e.actor).collect();
    assert_eq!(actors.last(), Some(&Actor::Operator("maria".to_string())));
}

// ════════════════════════════════════════════════════════════════════════════════
// Reconciliation sweep
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sweep_resolves_stuck_payment_from_provider() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-sweep").await;
    app.gateway
        .fail_next_create(GatewayError::timeout("stripe", "no response"))
        .await;
    let _ = app.state.payment_processor().process(&payment.id).await;

    // Anything in PROCESSING counts as stuck with a zero threshold.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let report = app.sweeper(Duration::ZERO).sweep_once().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.settled, 1);
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    let audit = app.audit.events().await;
    assert_eq!(audit.last().map(|e| e.actor.clone()), Some(Actor::Sweep));
}

#[tokio::test]
async fn sweep_ignores_fresh_processing_records() {
    let app = TestApp::new();
    let payment = create_payment(&app, "ref-fresh").await;
    app.gateway
        .fail_next_create(GatewayError::timeout("stripe", "no response"))
        .await;
    let _ = app.state.payment_processor().process(&payment.id).await;

    let report = app
        .sweeper(Duration::from_secs(3600))
        .sweep_once()
        .await
        .unwrap();

    assert_eq!(report.examined, 0);
    let stored = app.payments.find_by_id(&payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Processing);
}
