//! PostgreSQL adapters - settlement repositories.
//!
//! - `PostgresPaymentRepository` - general and enrollment payments
//! - `PostgresDonationRepository` - donations
//!
//! Status writes are compare-and-swap on the stored status. Schema lives in
//! `migrations/`.

mod common;
mod donation_repository;
mod payment_repository;

pub use donation_repository::PostgresDonationRepository;
pub use payment_repository::PostgresPaymentRepository;
