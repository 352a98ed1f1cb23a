//! HTTP handlers for payment, donation and webhook endpoints.
//!
//! These handlers connect Axum routes to the settlement command/query handlers.

use std::str::FromStr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::handlers::payment::{
    CreateDonationCommand, CreateDonationHandler, CreatePaymentCommand, CreatePaymentHandler,
    ForceFailHandler, GetRecordHandler, PaymentProcessor, ReconcileResult,
    ReconcileWebhookCommand, RefundCommand, RefundHandler, WebhookReconciler,
};
use crate::application::{CurrencyConverter, RecordLocks, SettlementEffects, StatusWriter};
use crate::domain::foundation::{DonationId, EnrollmentId, PaymentId, ValidationError};
use crate::domain::payment::{
    Actor, Currency, Donation, PaymentError, PaymentMethod, PaymentRecord,
};
use crate::ports::{DonationRepository, PaymentRepository, ProviderGateway};

use super::dto::{
    CreateDonationRequest, CreatePaymentRequest, DonationResponse, ErrorResponse,
    ForceFailRequest, PaymentMethodResponse, PaymentResponse, ProcessResponse,
    RefundPaymentRequest, RefundResponse, WebhookAck,
};

/// Header carrying the Stripe signature.
pub const STRIPE_SIGNATURE_HEADER: &str = "Stripe-Signature";
/// Header carrying the PayPal transmission signature.
pub const PAYPAL_SIGNATURE_HEADER: &str = "Paypal-Transmission-Sig";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the settlement endpoints.
///
/// Cloned per request; every dependency is behind an `Arc`.
#[derive(Clone)]
pub struct PaymentAppState {
    pub payments: Arc<PaymentRepository>,
    pub donations: Arc<DonationRepository>,
    pub gateway: Arc<dyn ProviderGateway>,
    pub converter: CurrencyConverter,
    pub effects: SettlementEffects,
    pub locks: Arc<RecordLocks>,
    pub reconciler: Arc<WebhookReconciler>,
}

impl PaymentAppState {
    pub fn payment_writer(&self) -> StatusWriter<PaymentRecord> {
        StatusWriter::new(self.payments.clone(), self.effects.clone())
    }

    pub fn donation_writer(&self) -> StatusWriter<Donation> {
        StatusWriter::new(self.donations.clone(), self.effects.clone())
    }

    pub fn create_payment_handler(&self) -> CreatePaymentHandler {
        CreatePaymentHandler::new(self.payments.clone(), self.converter.clone())
    }

    pub fn create_donation_handler(&self) -> CreateDonationHandler {
        CreateDonationHandler::new(self.donations.clone(), self.converter.clone())
    }

    pub fn get_payment_handler(&self) -> GetRecordHandler<PaymentRecord> {
        GetRecordHandler::new(self.payments.clone())
    }

    pub fn get_donation_handler(&self) -> GetRecordHandler<Donation> {
        GetRecordHandler::new(self.donations.clone())
    }

    pub fn payment_processor(&self) -> PaymentProcessor<PaymentRecord> {
        PaymentProcessor::new(self.payment_writer(), self.gateway.clone(), self.locks.clone())
    }

    pub fn donation_processor(&self) -> PaymentProcessor<Donation> {
        PaymentProcessor::new(self.donation_writer(), self.gateway.clone(), self.locks.clone())
    }

    pub fn refund_handler(&self) -> RefundHandler<PaymentRecord> {
        RefundHandler::new(self.payment_writer(), self.gateway.clone(), self.locks.clone())
    }

    pub fn force_fail_handler(&self) -> ForceFailHandler<PaymentRecord> {
        ForceFailHandler::new(self.payment_writer(), self.locks.clone())
    }

    pub fn donation_force_fail_handler(&self) -> ForceFailHandler<Donation> {
        ForceFailHandler::new(self.donation_writer(), self.locks.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/payments/methods - Methods offered to customers
pub async fn list_payment_methods() -> impl IntoResponse {
    let methods: Vec<PaymentMethodResponse> = PaymentMethod::SELECTABLE
        .iter()
        .map(|method| PaymentMethodResponse {
            value: *method,
            label: method.label().to_string(),
        })
        .collect();
    Json(methods)
}

/// GET /api/payments/:id - Get a payment
pub async fn get_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let payment = state
        .get_payment_handler()
        .handle(&PaymentId::from_uuid(id))
        .await?;
    Ok(Json(PaymentResponse::from(payment)))
}

/// GET /api/donations/:id - Get a donation
pub async fn get_donation(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let donation = state
        .get_donation_handler()
        .handle(&DonationId::from_uuid(id))
        .await?;
    Ok(Json(DonationResponse::from(donation)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/payments - Create a pending payment
pub async fn create_payment(
    State(state): State<PaymentAppState>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = CreatePaymentCommand {
        amount: request.amount,
        currency: Currency::from_str(&request.currency)?,
        method: parse_method(request.method.as_deref())?,
        reference: request.reference,
        enrollment_id: request.enrollment_id.map(EnrollmentId::from_uuid),
        notes: request.notes,
        receipt_ref: request.receipt_ref,
    };

    let payment = state.create_payment_handler().handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(PaymentResponse::from(payment))))
}

/// POST /api/payments/:id/process - Charge a pending payment
pub async fn process_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let outcome = state
        .payment_processor()
        .process(&PaymentId::from_uuid(id))
        .await?;
    Ok(Json(ProcessResponse {
        record: PaymentResponse::from(outcome.record),
        client_secret: outcome.client_secret,
    }))
}

/// POST /api/payments/:id/refund - Refund a settled payment
pub async fn refund_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<RefundPaymentRequest>>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let actor = match request.operator {
        Some(operator) => Actor::Operator(operator),
        None => Actor::System,
    };

    let result = state
        .refund_handler()
        .handle(RefundCommand {
            id: PaymentId::from_uuid(id),
            amount: request.amount,
            actor,
        })
        .await?;

    Ok(Json(RefundResponse {
        payment: PaymentResponse::from(result.record),
        refund_id: result.refund.refund_id,
        refund_status: result.refund.status,
    }))
}

/// POST /api/payments/:id/force-fail - Operator resolution of a stuck payment
pub async fn force_fail_payment(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ForceFailRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let operator = operator_name(&request)?;
    let payment = state
        .force_fail_handler()
        .handle(&PaymentId::from_uuid(id), operator, request.reason.as_deref())
        .await?;
    Ok(Json(PaymentResponse::from(payment)))
}

/// POST /api/donations/:id/force-fail - Operator resolution of a stuck donation
pub async fn force_fail_donation(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ForceFailRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let operator = operator_name(&request)?;
    let donation = state
        .donation_force_fail_handler()
        .handle(&DonationId::from_uuid(id), operator, request.reason.as_deref())
        .await?;
    Ok(Json(DonationResponse::from(donation)))
}

fn operator_name(request: &ForceFailRequest) -> Result<&str, PaymentError> {
    let operator = request.operator.trim();
    if operator.is_empty() {
        return Err(ValidationError::empty_field("operator").into());
    }
    Ok(operator)
}

/// POST /api/donations - Record a pending donation
pub async fn create_donation(
    State(state): State<PaymentAppState>,
    Json(request): Json<CreateDonationRequest>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let cmd = CreateDonationCommand {
        donor_name: request.donor_name,
        donor_email: request.donor_email,
        amount: request.amount,
        currency: Currency::from_str(&request.currency)?,
        method: parse_method(request.method.as_deref())?,
        reference: request.reference,
        notes: request.notes,
    };

    let donation = state.create_donation_handler().handle(cmd).await?;
    Ok((StatusCode::CREATED, Json(DonationResponse::from(donation))))
}

/// POST /api/donations/:id/process - Charge a pending donation
pub async fn process_donation(
    State(state): State<PaymentAppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentApiError> {
    let outcome = state
        .donation_processor()
        .process(&DonationId::from_uuid(id))
        .await?;
    Ok(Json(ProcessResponse {
        record: DonationResponse::from(outcome.record),
        client_secret: outcome.client_secret,
    }))
}

fn parse_method(raw: Option<&str>) -> Result<PaymentMethod, PaymentError> {
    match raw {
        None => Ok(PaymentMethod::Card),
        Some(raw) => PaymentMethod::from_str(raw)
            .map_err(|e| ValidationError::invalid_format("method", e).into()),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/webhooks/stripe - Stripe event delivery
///
/// The raw body is needed for signature verification, so it is taken as
/// `Bytes` rather than JSON.
pub async fn handle_stripe_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    handle_webhook(&state.reconciler, "stripe", STRIPE_SIGNATURE_HEADER, &headers, body).await
}

/// POST /api/webhooks/paypal - PayPal event delivery
pub async fn handle_paypal_webhook(
    State(state): State<PaymentAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    handle_webhook(&state.reconciler, "paypal", PAYPAL_SIGNATURE_HEADER, &headers, body).await
}

async fn handle_webhook(
    reconciler: &WebhookReconciler,
    provider: &str,
    signature_header: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = match headers.get(signature_header).and_then(|v| v.to_str().ok()) {
        Some(sig) => sig.to_string(),
        None => {
            tracing::warn!(provider, "webhook missing signature header");
            let error = ErrorResponse::new(
                "MISSING_SIGNATURE",
                format!("Missing {} header", signature_header),
            );
            return (StatusCode::BAD_REQUEST, Json(error)).into_response();
        }
    };

    let cmd = ReconcileWebhookCommand {
        provider: provider.to_string(),
        payload: body.to_vec(),
        signature,
    };

    match reconciler.reconcile(cmd).await {
        Ok(result) => {
            let ack = WebhookAck {
                received: true,
                outcome: outcome_label(&result).to_string(),
            };
            (StatusCode::OK, Json(ack)).into_response()
        }
        Err(e) => {
            let status = e.status_code();
            if status.is_server_error() {
                tracing::error!(provider, error = %e, "webhook processing failed");
            } else {
                tracing::warn!(provider, error = %e, "webhook rejected");
            }
            let error = ErrorResponse::new("WEBHOOK_ERROR", e.to_string());
            (status, Json(error)).into_response()
        }
    }
}

fn outcome_label(result: &ReconcileResult) -> &'static str {
    match result {
        ReconcileResult::Applied { .. } => "applied",
        ReconcileResult::AlreadyApplied { .. } => "already_applied",
        ReconcileResult::Skipped { .. } => "skipped",
        ReconcileResult::Unmatched { .. } => "unmatched",
        ReconcileResult::Ignored { .. } => "ignored",
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error wrapper for settlement errors.
#[derive(Debug)]
pub struct PaymentApiError(pub PaymentError);

impl From<PaymentError> for PaymentApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for PaymentApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            PaymentError::InvalidAmount(_)
            | PaymentError::InvalidCurrency(_)
            | PaymentError::InvalidSignature
            | PaymentError::Validation(_) => StatusCode::BAD_REQUEST,
            PaymentError::DuplicateReference(_)
            | PaymentError::InvalidTransition { .. }
            | PaymentError::AlreadyProcessed(_) => StatusCode::CONFLICT,
            PaymentError::NotFound { .. } => StatusCode::NOT_FOUND,
            PaymentError::Provider { .. } => StatusCode::BAD_GATEWAY,
            PaymentError::Infrastructure(msg) => {
                tracing::error!(error = %msg, "settlement infrastructure failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            PaymentError::Infrastructure(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };
        let error = ErrorResponse::new(self.0.code().to_string(), message);
        (status, Json(error)).into_response()
    }
}
