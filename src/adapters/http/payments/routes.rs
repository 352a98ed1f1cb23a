//! Axum router configuration for settlement endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    create_donation, create_payment, force_fail_donation, force_fail_payment, get_donation,
    get_payment,
    handle_paypal_webhook, handle_stripe_webhook, list_payment_methods, process_donation,
    process_payment, refund_payment, PaymentAppState,
};

/// Payment routes, mounted at `/api/payments`.
///
/// - `POST /` - Create a pending payment
/// - `GET /methods` - Selectable payment methods
/// - `GET /:id` - Get a payment
/// - `POST /:id/process` - Charge through the provider
/// - `POST /:id/refund` - Refund a settled payment
/// - `POST /:id/force-fail` - Operator resolution of a stuck payment
pub fn payment_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_payment))
        .route("/methods", get(list_payment_methods))
        .route("/:id", get(get_payment))
        .route("/:id/process", post(process_payment))
        .route("/:id/refund", post(refund_payment))
        .route("/:id/force-fail", post(force_fail_payment))
}

/// Donation routes, mounted at `/api/donations`.
///
/// - `POST /` - Record a pending donation
/// - `GET /:id` - Get a donation
/// - `POST /:id/process` - Charge through the provider
/// - `POST /:id/force-fail` - Operator resolution of a stuck donation
pub fn donation_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/", post(create_donation))
        .route("/:id", get(get_donation))
        .route("/:id/process", post(process_donation))
        .route("/:id/force-fail", post(force_fail_donation))
}

/// Provider webhook routes, mounted at `/api/webhooks`.
///
/// No caller authentication; deliveries are verified by signature.
pub fn webhook_routes() -> Router<PaymentAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/paypal", post(handle_paypal_webhook))
}

/// All settlement routes under `/api`.
pub fn settlement_router() -> Router<PaymentAppState> {
    Router::new()
        .nest("/api/payments", payment_routes())
        .nest("/api/donations", donation_routes())
        .nest("/api/webhooks", webhook_routes())
}
