//! Donations.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::currency::{Currency, CurrencyAmounts};
use super::errors::PaymentError;
use super::method::PaymentMethod;
use super::settlement::{checked_transition, ensure_valid_amount, Settleable};
use super::status::PaymentStatus;
use crate::domain::foundation::{DonationId, Timestamp, ValidationError};

/// Identified donor. Name and email always travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub name: String,
    pub email: String,
}

impl Donor {
    /// Builds a donor from optional parts; both or neither must be present.
    pub fn from_parts(
        name: Option<String>,
        email: Option<String>,
    ) -> Result<Option<Self>, ValidationError> {
        let name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        let email = email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());

        match (name, email) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::empty_field("donor_email")),
            (None, Some(_)) => Err(ValidationError::empty_field("donor_name")),
            (Some(name), Some(email)) => {
                if !email.contains('@') {
                    return Err(ValidationError::invalid_format(
                        "donor_email",
                        "missing @ symbol",
                    ));
                }
                Ok(Some(Donor { name, email }))
            }
        }
    }
}

/// Input for creating a donation.
#[derive(Debug, Clone)]
pub struct NewDonation {
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

/// A donation. Settles like a payment but never cascades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
    pub id: DonationId,
    pub donor: Option<Donor>,
    pub amount: Decimal,
    pub currency: Currency,
    pub amount_domestic: Decimal,
    pub amount_foreign: Decimal,
    pub method: PaymentMethod,
    pub provider_reference: Option<String>,
    pub status: PaymentStatus,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Donation {
    pub fn create(input: NewDonation, amounts: CurrencyAmounts) -> Result<Self, PaymentError> {
        ensure_valid_amount(input.amount)?;
        let donor = Donor::from_parts(input.donor_name, input.donor_email)?;
        let reference = input
            .reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());

        let now = Timestamp::now();
        Ok(Self {
            id: DonationId::new(),
            donor,
            amount: input.amount,
            currency: input.currency,
            amount_domestic: amounts.domestic,
            amount_foreign: amounts.foreign,
            method: input.method,
            provider_reference: reference,
            status: PaymentStatus::Pending,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn donor_display_name(&self) -> &str {
        self.donor.as_ref().map(|d| d.name.as_str()).unwrap_or("Anonymous")
    }
}

impl Settleable for Donation {
    type Id = DonationId;
    const ENTITY: &'static str = "donation";

    fn id(&self) -> DonationId {
        self.id
    }

    fn status(&self) -> PaymentStatus {
        self.status
    }

    fn amount(&self) -> Decimal {
        self.amount
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn provider_reference(&self) -> Option<&str> {
        self.provider_reference.as_deref()
    }

    fn created_at(&self) -> Timestamp {
        self.created_at
    }

    fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    fn description(&self) -> String {
        format!("Donation from {}", self.donor_display_name())
    }

    fn idempotency_key(&self) -> String {
        format!("donation-{}", self.id)
    }

    fn apply_status(
        &mut self,
        target: PaymentStatus,
        at: Timestamp,
    ) -> Result<PaymentStatus, PaymentError> {
        let previous = self.status;
        self.status = checked_transition(previous, target)?;
        self.updated_at = at;
        Ok(previous)
    }

    fn assign_provider_reference(&mut self, reference: String) {
        self.provider_reference = Some(reference);
    }
    fn touch(&mut self, at: Timestamp) {
        self.updated_at = at;
    }
}
