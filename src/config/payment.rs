//! Payment provider configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Providers the service can be wired to.
pub const KNOWN_PROVIDERS: [&str; 3] = ["stripe", "paypal", "mock"];

/// Payment configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Provider used for processing: `stripe`, `paypal` or `mock`
    #[serde(default = "default_provider")]
    pub default_provider: String,

    #[serde(default)]
    pub stripe: Option<StripeSettings>,

    #[serde(default)]
    pub paypal: Option<PayPalSettings>,

    /// Age after which a PROCESSING record is picked up by the sweep
    #[serde(default = "default_stuck_after")]
    pub stuck_processing_after_secs: u64,

    /// Pause between sweep passes
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Records examined per entity per pass
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: u32,

    /// Age since creation at which the sweep fails a record it cannot resolve
    #[serde(default = "default_give_up_after")]
    pub abandon_processing_after_secs: u64,
}

/// Stripe credentials and limits
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSettings {
    pub api_key: SecretString,
    pub webhook_secret: SecretString,
    #[serde(default)]
    pub sandbox_mode: bool,
    /// Overrides the API host (tests, proxies)
    pub base_url: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

/// PayPal credentials and limits
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalSettings {
    pub client_id: String,
    /// OAuth client secret
    pub api_key: SecretString,
    pub webhook_secret: SecretString,
    #[serde(default = "default_true")]
    pub sandbox_mode: bool,
    pub base_url: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

impl StripeSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.api_key.expose_secret().starts_with("sk_test_")
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let key = self.api_key.expose_secret();
        if key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE__API_KEY"));
        }
        if !key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        // A live key in sandbox mode would move real money.
        if self.sandbox_mode && !self.is_test_mode() {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.webhook_secret.expose_secret().starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        validate_limits(self.max_concurrent_calls, self.timeout_secs)?;
        validate_base_url(self.base_url.as_deref(), "STRIPE__BASE_URL")
    }
}

impl PayPalSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.client_id.trim().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL__CLIENT_ID"));
        }
        if self.api_key.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL__API_KEY"));
        }
        if self.webhook_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL__WEBHOOK_SECRET"));
        }
        validate_limits(self.max_concurrent_calls, self.timeout_secs)?;
        validate_base_url(self.base_url.as_deref(), "PAYPAL__BASE_URL")
    }
}

fn validate_limits(max_concurrent_calls: usize, timeout_secs: u64) -> Result<(), ValidationError> {
    if max_concurrent_calls == 0 {
        return Err(ValidationError::InvalidConcurrency);
    }
    if timeout_secs == 0 {
        return Err(ValidationError::InvalidTimeout);
    }
    Ok(())
}

fn validate_base_url(url: Option<&str>, name: &'static str) -> Result<(), ValidationError> {
    match url {
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            Err(ValidationError::InvalidUrl(name))
        }
        _ => Ok(()),
    }
}

impl PaymentConfig {
    pub fn stuck_processing_after(&self) -> Duration {
        Duration::from_secs(self.stuck_processing_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn abandon_processing_after(&self) -> Duration {
        Duration::from_secs(self.abandon_processing_after_secs)
    }

    /// Validate payment configuration
    ///
    /// The `mock` provider is refused in production.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let provider = self.default_provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(ValidationError::UnknownProvider(self.default_provider.clone()));
        }
        let configured = match provider {
            "stripe" => self.stripe.is_some(),
            "paypal" => self.paypal.is_some(),
            _ => *environment != Environment::Production,
        };
        if !configured {
            return Err(ValidationError::ProviderNotConfigured(self.default_provider.clone()));
        }

        if let Some(stripe) = &self.stripe {
            stripe.validate()?;
        }
        if let Some(paypal) = &self.paypal {
            paypal.validate()?;
        }
        if self.sweep_interval_secs == 0
            || self.stuck_processing_after_secs == 0
            || self.abandon_processing_after_secs <= self.stuck_processing_after_secs
        {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            stripe: None,
            paypal: None,
            stuck_processing_after_secs: default_stuck_after(),
            sweep_interval_secs: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch(),
            abandon_processing_after_secs: default_give_up_after(),
        }
    }
}

fn default_provider() -> String {
    "mock".to_string()
}

fn default_stuck_after() -> u64 {
    900
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_sweep_batch() -> u32 {
    50
}

fn default_give_up_after() -> u64 {
    86_400
}

fn default_provider_timeout() -> u64 {
    10
}

fn default_max_concurrent_calls() -> usize {
    8
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripe(api_key: &str, webhook_secret: &str) -> StripeSettings {
        StripeSettings {
            api_key: SecretString::new(api_key.to_string()),
            webhook_secret: SecretString::new(webhook_secret.to_string()),
            sandbox_mode: true,
            base_url: None,
            timeout_secs: 10,
            max_concurrent_calls: 8,
        }
    }

    fn with_stripe(settings: StripeSettings) -> PaymentConfig {
        PaymentConfig {
            default_provider: "stripe".to_string(),
            stripe: Some(settings),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = PaymentConfig::default();
        assert_eq!(config.default_provider, "mock");
        assert_eq!(config.stuck_processing_after(), Duration::from_secs(900));
        assert_eq!(config.sweep_interval(), Duration::from_secs(60));
        assert_eq!(config.abandon_processing_after(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_give_up_age_must_exceed_stuck_age() {
        let config = PaymentConfig {
            stuck_processing_after_secs: 900,
            abandon_processing_after_secs: 600,
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidTimeout)
        );
    }

    #[test]
    fn test_mock_refused_in_production() {
        let config = PaymentConfig::default();
        assert!(config.validate(&Environment::Development).is_ok());
        assert_eq!(
            config.validate(&Environment::Production),
            Err(ValidationError::ProviderNotConfigured("mock".to_string()))
        );
    }

    #[test]
    fn test_unknown_provider() {
        let config = PaymentConfig {
            default_provider: "square".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(&Environment::Development),
            Err(ValidationError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_selected_provider_must_be_configured() {
        let config = PaymentConfig {
            default_provider: "paypal".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::ProviderNotConfigured("paypal".to_string()))
        );
    }

    #[test]
    fn test_valid_stripe_sandbox() {
        let config = with_stripe(stripe("sk_test_abc", "whsec_abc"));
        assert!(config.validate(&Environment::Production).is_ok());
    }

    #[test]
    fn test_live_key_rejected_in_sandbox_mode() {
        let config = with_stripe(stripe("sk_live_abc", "whsec_abc"));
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeKey)
        );
    }

    #[test]
    fn test_bad_webhook_secret() {
        let config = with_stripe(stripe("sk_test_abc", "secret"));
        assert_eq!(
            config.validate(&Environment::Development),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut settings = stripe("sk_test_abc", "whsec_abc");
        settings.max_concurrent_calls = 0;
        assert_eq!(
            with_stripe(settings).validate(&Environment::Development),
            Err(ValidationError::InvalidConcurrency)
        );
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let settings = stripe("sk_test_very_secret", "whsec_abc");
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("very_secret"));
    }
}
