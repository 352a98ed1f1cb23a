//! Enrollment collaborator configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Where enrollment outcomes are delivered
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnrollmentConfig {
    /// Outcomes are only logged when absent
    pub callback_url: Option<String>,

    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl EnrollmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(5))
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.callback_url {
            Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                Err(ValidationError::InvalidUrl("ENROLLMENT__CALLBACK_URL"))
            }
            _ => Ok(()),
        }
    }
}
