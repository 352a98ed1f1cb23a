//! Payment settlement domain.
//!
//! Payments (general and enrollment-linked) and donations share one status
//! graph, one currency model and one notification vocabulary. Everything
//! here is pure; I/O lives behind the ports.

mod audit;
mod cascade;
mod currency;
mod donation;
mod errors;
mod method;
mod notification;
mod record;
mod settlement;
mod status;
mod webhook;

pub use audit::{Actor, StatusChanged};
pub use cascade::EnrollmentOutcome;
pub use currency::{convert_at, round_money, Currency, CurrencyAmounts};
pub use donation::{Donation, Donor, NewDonation};
pub use errors::PaymentError;
pub use method::PaymentMethod;
pub use notification::{Notification, NotificationContext, NotificationEmitter, NotificationKind};
pub use record::{NewPayment, PaymentKind, PaymentRecord};
pub use settlement::{Settleable, AMOUNT_LIMIT};
pub use status::PaymentStatus;
pub use webhook::{ProviderEvent, WebhookError};
