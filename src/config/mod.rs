//! Service configuration.
//!
//! Type-safe configuration loaded from environment variables with the
//! `config` and `dotenvy` crates. Variables use the `PARK_PAYMENTS` prefix
//! and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use park_payments::config::AppConfig;
//!
//! let config = AppConfig::load()?;
//! config.validate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod database;
mod enrollment;
mod error;
mod exchange;
mod payment;
mod server;

pub use database::{DatabaseConfig, StorageBackend};
pub use enrollment::EnrollmentConfig;
pub use error::{ConfigError, ValidationError};
pub use exchange::ExchangeConfig;
pub use payment::{PayPalSettings, PaymentConfig, StripeSettings, KNOWN_PROVIDERS};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Everything the binary needs to wire the settlement core.
///
/// Every section has defaults, so an empty environment yields an
/// in-memory development setup with the mock provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Listener, environment and logging
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL storage; in-memory when no URL is set
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Provider credentials and the reconciliation sweep
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Exchange-rate feed and fallback rate
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Enrollment collaborator callback
    #[serde(default)]
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    /// Reads `.env` when present, then `PARK_PAYMENTS__*` variables.
    ///
    /// - `PARK_PAYMENTS__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PARK_PAYMENTS__PAYMENT__STRIPE__API_KEY=...` -> `payment.stripe.api_key`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PARK_PAYMENTS")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Checks each section; the first offending value wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(&self.server.environment)?;
        self.exchange.validate()?;
        self.enrollment.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
