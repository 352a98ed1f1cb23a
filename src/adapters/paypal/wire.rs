//! PayPal orders API types.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::payment::Currency;
use crate::ports::IntentStatus;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Money {
    pub currency_code: String,
    pub value: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self {
            currency_code: currency.code().to_string(),
            value: format_amount(amount, currency),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrder {
    pub intent: &'static str,
    pub purchase_units: Vec<PurchaseUnitRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseUnitRequest {
    pub reference_id: String,
    /// Echoed on captures and orders in webhook resources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    pub description: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub purchase_units: Vec<PurchaseUnit>,
}

impl Order {
    pub fn intent_status(&self) -> IntentStatus {
        match self.status.as_str() {
            "COMPLETED" => IntentStatus::Succeeded,
            "VOIDED" => IntentStatus::Canceled,
            // CREATED, SAVED, APPROVED, PAYER_ACTION_REQUIRED
            _ => IntentStatus::Pending,
        }
    }

    /// Link the payer follows to approve the order.
    pub fn approval_url(&self) -> Option<String> {
        self.links
            .iter()
            .find(|l| l.rel == "approve" || l.rel == "payer-action")
            .map(|l| l.href.clone())
    }

    pub fn first_capture_id(&self) -> Option<&str> {
        self.purchase_units
            .iter()
            .filter_map(|u| u.payments.as_ref())
            .flat_map(|p| p.captures.iter())
            .map(|c| c.id.as_str())
            .next()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Link {
    pub href: String,
    pub rel: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseUnit {
    pub payments: Option<Payments>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payments {
    #[serde(default)]
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Capture {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundResponse {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalErrorBody {
    pub name: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub details: Vec<PayPalErrorDetail>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayPalErrorDetail {
    pub issue: Option<String>,
    pub description: Option<String>,
}

// Webhook payloads

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    pub resource: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookResource {
    pub id: String,
    pub status_details: Option<StatusDetails>,
    pub supplementary_data: Option<SupplementaryData>,
    /// Set on capture resources.
    pub custom_id: Option<String>,
    /// Set on order resources.
    #[serde(default)]
    pub purchase_units: Vec<ResourcePurchaseUnit>,
}

impl WebhookResource {
    /// Order the resource belongs to; captures point back at their order.
    pub fn order_id(&self) -> &str {
        self.supplementary_data
            .as_ref()
            .and_then(|d| d.related_ids.order_id.as_deref())
            .unwrap_or(&self.id)
    }

    /// Record reference sent as `custom_id` when the order was created.
    pub fn client_reference(&self) -> Option<String> {
        self.custom_id
            .clone()
            .or_else(|| self.purchase_units.iter().find_map(|u| u.custom_id.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourcePurchaseUnit {
    pub reference_id: Option<String>,
    pub custom_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusDetails {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplementaryData {
    pub related_ids: RelatedIds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedIds {
    pub order_id: Option<String>,
}

/// Currencies PayPal accepts without a fraction.
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["HUF", "JPY", "TWD"];

/// Renders a major-unit amount the way the orders API expects it.
pub fn format_amount(amount: Decimal, currency: Currency) -> String {
    let places = if ZERO_DECIMAL_CURRENCIES.contains(&currency.code()) {
        0
    } else {
        2
    };
    let rounded = amount.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", places as usize, rounded)
}
