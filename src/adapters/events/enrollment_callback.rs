//! Enrollment notifier calling the scheduling service over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::foundation::{DomainError, EnrollmentId};
use crate::domain::payment::EnrollmentOutcome;
use crate::ports::EnrollmentNotifier;

#[derive(Debug, Serialize)]
struct OutcomeBody<'a> {
    enrollment_id: EnrollmentId,
    payment_status: &'a str,
}

/// Posts `{enrollment_id, payment_status}` to the configured callback.
/// Without a callback URL outcomes are only logged.
pub struct HttpEnrollmentNotifier {
    callback_url: Option<String>,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl HttpEnrollmentNotifier {
    pub fn new(callback_url: Option<String>, timeout: Duration) -> Self {
        Self {
            callback_url,
            timeout,
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl EnrollmentNotifier for HttpEnrollmentNotifier {
    async fn on_payment_outcome(
        &self,
        enrollment_id: EnrollmentId,
        outcome: EnrollmentOutcome,
    ) -> Result<(), DomainError> {
        let Some(url) = &self.callback_url else {
            tracing::info!(%enrollment_id, outcome = %outcome, "enrollment outcome (no callback configured)");
            return Ok(());
        };

        let response = self
            .http_client
            .post(url)
            .timeout(self.timeout)
            .json(&OutcomeBody {
                enrollment_id,
                payment_status: outcome.as_str(),
            })
            .send()
            .await
            .map_err(|e| DomainError::database(format!("enrollment callback failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::database(format!(
                "enrollment callback answered {}",
                response.status()
            )));
        }

        tracing::debug!(%enrollment_id, outcome = %outcome, "enrollment outcome delivered");
        Ok(())
    }
}
