//! HTTP adapter for payments, donations and provider webhooks.

mod dto;
mod handlers;
mod routes;

pub use dto::*;
pub use handlers::{PaymentApiError, PaymentAppState, PAYPAL_SIGNATURE_HEADER, STRIPE_SIGNATURE_HEADER};
pub use routes::{donation_routes, payment_routes, settlement_router, webhook_routes};
