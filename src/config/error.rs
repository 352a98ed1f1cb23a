//! Configuration errors

use thiserror::Error;

/// Failure to read configuration sources
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("configuration rejected: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// A loaded value the service refuses to start with
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required setting {0}")]
    MissingRequired(&'static str),

    #[error("port must be non-zero")]
    InvalidPort,

    #[error("timeout or interval out of range")]
    InvalidTimeout,

    #[error("cannot bind to {0}")]
    InvalidSocketAddr(String),

    #[error("database url must use the postgres scheme")]
    InvalidDatabaseUrl,

    #[error("connection pool bounds are inconsistent")]
    InvalidPoolSize,

    #[error("connection pool larger than 100")]
    PoolSizeTooLarge,

    #[error("stripe api key must start with sk_ (sk_test_ in sandbox mode)")]
    InvalidStripeKey,

    #[error("stripe webhook secret must start with whsec_")]
    InvalidStripeWebhookSecret,

    #[error("unknown payment provider {0}")]
    UnknownProvider(String),

    #[error("payment provider {0} selected but not usable here")]
    ProviderNotConfigured(String),

    #[error("max_concurrent_calls must be at least 1")]
    InvalidConcurrency,

    #[error("{0} must be an http(s) url")]
    InvalidUrl(&'static str),

    #[error("exchange default_rate must be positive")]
    InvalidExchangeRate,
}
