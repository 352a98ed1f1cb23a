//! Recording doubles for the notification, enrollment and audit collaborators.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, EnrollmentId};
use crate::domain::payment::{EnrollmentOutcome, Notification, StatusChanged};
use crate::ports::{AuditSink, EnrollmentNotifier, NotificationSink};

/// Keeps delivered notifications in memory.
#[derive(Default)]
pub struct InMemoryNotificationSink {
    delivered: Mutex<Vec<Notification>>,
}

impl InMemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<Notification> {
        self.delivered.lock().await.clone()
    }
}

#[async_trait]
impl NotificationSink for InMemoryNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), DomainError> {
        tracing::debug!(
            correlated_id = %notification.correlated_id,
            title = %notification.title,
            "notification queued"
        );
        self.delivered.lock().await.push(notification);
        Ok(())
    }
}

/// Records every outcome sent to the enrollment collaborator.
#[derive(Default)]
pub struct RecordingEnrollmentNotifier {
    outcomes: Mutex<Vec<(EnrollmentId, EnrollmentOutcome)>>,
}

impl RecordingEnrollmentNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn outcomes(&self) -> Vec<(EnrollmentId, EnrollmentOutcome)> {
        self.outcomes.lock().await.clone()
    }
}

#[async_trait]
impl EnrollmentNotifier for RecordingEnrollmentNotifier {
    async fn on_payment_outcome(
        &self,
        enrollment_id: EnrollmentId,
        outcome: EnrollmentOutcome,
    ) -> Result<(), DomainError> {
        self.outcomes.lock().await.push((enrollment_id, outcome));
        Ok(())
    }
}

/// Records audit events.
#[derive(Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<StatusChanged>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<StatusChanged> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn record(&self, event: StatusChanged) -> Result<(), DomainError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
