//! Application layer - handlers and the services they share.
//!
//! Handlers orchestrate domain records through ports. Every status change
//! goes through [`StatusWriter`], serialised per record by [`RecordLocks`].

pub mod currency;
pub mod handlers;
pub mod record_locks;
pub mod status_writer;

pub use currency::{CurrencyConverter, ExchangeRateCache, ExchangeRateCacheConfig};
pub use record_locks::RecordLocks;
pub use status_writer::{SettlementEffects, StatusWriter, WriteOutcome};
