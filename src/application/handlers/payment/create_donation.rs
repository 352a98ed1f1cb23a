//! CreateDonationHandler - Command handler for registering a donation.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::application::currency::CurrencyConverter;
use crate::domain::payment::{
    Currency, Donation, NewDonation, PaymentError, PaymentMethod, AMOUNT_LIMIT,
};
use crate::ports::DonationRepository;

/// Command to create a donation.
#[derive(Debug, Clone)]
pub struct CreateDonationCommand {
    pub donor_name: Option<String>,
    pub donor_email: Option<String>,
    pub amount: Decimal,
    pub currency: Currency,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
}

pub struct CreateDonationHandler {
    repository: Arc<DonationRepository>,
    converter: CurrencyConverter,
}

impl CreateDonationHandler {
    pub fn new(repository: Arc<DonationRepository>, converter: CurrencyConverter) -> Self {
        Self {
            repository,
            converter,
        }
    }

    pub async fn handle(&self, cmd: CreateDonationCommand) -> Result<Donation, PaymentError> {
        if cmd.amount <= Decimal::ZERO || cmd.amount >= AMOUNT_LIMIT {
            return Err(PaymentError::InvalidAmount(cmd.amount));
        }

        let amounts = self.converter.get_both_amounts(cmd.amount, cmd.currency).await?;
        let donation = Donation::create(
            NewDonation {
                donor_name: cmd.donor_name,
                donor_email: cmd.donor_email,
                amount: cmd.amount,
                currency: cmd.currency,
                method: cmd.method,
                reference: cmd.reference,
                notes: cmd.notes,
            },
            amounts,
        )?;

        self.repository.insert(&donation).await?;

        tracing::info!(
            donation_id = %donation.id,
            amount = %donation.amount,
            currency = %donation.currency,
            anonymous = donation.donor.is_none(),
            "donation created"
        );
        Ok(donation)
    }
}
