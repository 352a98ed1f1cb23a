//! Fan-out notification sink for connected UI clients.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::foundation::DomainError;
use crate::domain::payment::Notification;
use crate::ports::NotificationSink;

/// Publishes notifications on a broadcast channel.
///
/// Notifications are fire-and-forget: with no subscriber, or a lagging one,
/// they are dropped.
pub struct BroadcastNotificationSink {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotificationSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl NotificationSink for BroadcastNotificationSink {
    async fn deliver(&self, notification: Notification) -> Result<(), DomainError> {
        let correlated_id = notification.correlated_id.clone();
        match self.sender.send(notification) {
            Ok(receivers) => {
                tracing::debug!(%correlated_id, receivers, "notification broadcast");
            }
            Err(_) => {
                tracing::debug!(%correlated_id, "notification dropped, no subscribers");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::domain::payment::NotificationKind;

    fn notice() -> Notification {
        Notification {
            kind: NotificationKind::Success,
            title: "Payment confirmed".into(),
            message: "Payment of 100.00 CRC confirmed".into(),
            correlated_id: "p-1".into(),
            timestamp: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let sink = BroadcastNotificationSink::new(8);
        let mut rx = sink.subscribe();

        sink.deliver(notice()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.correlated_id, "p-1");
    }

    #[tokio::test]
    async fn delivery_without_subscribers_is_not_an_error() {
        let sink = BroadcastNotificationSink::new(8);
        assert!(sink.deliver(notice()).await.is_ok());
    }
}
