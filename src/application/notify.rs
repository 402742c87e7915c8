//! Fire-and-forget notifications about record lifecycle events.
//!
//! `dispatch` never blocks the request path: events go onto a bounded queue drained by a
//! background worker, and a full queue drops the event.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::entities::Record;

pub(crate) const METRIC_NOTIFICATION_PUBLISHED: &str = "shopkeep_notification_published_total";
pub(crate) const METRIC_NOTIFICATION_FAILED: &str = "shopkeep_notification_failed_total";
pub(crate) const METRIC_NOTIFICATION_DROPPED: &str = "shopkeep_notification_dropped_total";

const TARGET: &str = "shopkeep::notify";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub topic: String,
    pub kind: String,
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    pub payload: Value,
}

impl Notification {
    /// Describe the creation of `record` on `topic`.
    pub fn created<E: Record>(topic: &str, record: &E) -> Result<Self, NotifyError> {
        let payload = serde_json::to_value(record).map_err(|err| NotifyError::Encode {
            message: err.to_string(),
        })?;
        Ok(Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            kind: format!("{}.created", E::COLLECTION.entity()),
            occurred_at: OffsetDateTime::now_utc(),
            payload,
        })
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification could not be encoded: {message}")]
    Encode { message: String },
    #[error("broker rejected notification: {message}")]
    Rejected { message: String },
    #[error("broker unreachable: {message}")]
    Transport { message: String },
}

#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Handle used by services to enqueue notifications.
#[derive(Clone)]
pub struct NotificationDispatcher {
    sender: mpsc::Sender<Notification>,
    topic: Arc<str>,
}

impl NotificationDispatcher {
    /// Start the delivery worker. It exits once every dispatcher clone has been dropped and
    /// the queue is drained.
    pub fn spawn(
        publisher: Arc<dyn NotificationPublisher>,
        queue_capacity: NonZeroUsize,
        topic: impl Into<Arc<str>>,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity.get());
        let worker = tokio::spawn(deliver(publisher, receiver));
        (
            Self {
                sender,
                topic: topic.into(),
            },
            worker,
        )
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn notify_created<E: Record>(&self, record: &E) {
        match Notification::created(&self.topic, record) {
            Ok(notification) => {
                self.dispatch(notification);
            }
            Err(err) => {
                counter!(METRIC_NOTIFICATION_FAILED, "topic" => self.topic.to_string())
                    .increment(1);
                warn!(target: TARGET, error = %err, "notification could not be built");
            }
        }
    }

    /// Enqueue without waiting. Returns whether the event was accepted.
    pub fn dispatch(&self, notification: Notification) -> bool {
        match self.sender.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(notification)) => {
                counter!(METRIC_NOTIFICATION_DROPPED, "topic" => notification.topic.clone())
                    .increment(1);
                warn!(
                    target: TARGET,
                    topic = %notification.topic,
                    kind = %notification.kind,
                    "notification queue full; dropping event"
                );
                false
            }
            Err(TrySendError::Closed(notification)) => {
                counter!(METRIC_NOTIFICATION_DROPPED, "topic" => notification.topic.clone())
                    .increment(1);
                warn!(
                    target: TARGET,
                    topic = %notification.topic,
                    kind = %notification.kind,
                    "notification worker stopped; dropping event"
                );
                false
            }
        }
    }
}

async fn deliver(
    publisher: Arc<dyn NotificationPublisher>,
    mut receiver: mpsc::Receiver<Notification>,
) {
    while let Some(notification) = receiver.recv().await {
        match publisher.publish(&notification).await {
            Ok(()) => {
                counter!(METRIC_NOTIFICATION_PUBLISHED, "topic" => notification.topic.clone())
                    .increment(1);
                debug!(
                    target: TARGET,
                    id = %notification.id,
                    kind = %notification.kind,
                    "notification published"
                );
            }
            Err(err) => {
                counter!(METRIC_NOTIFICATION_FAILED, "topic" => notification.topic.clone())
                    .increment(1);
                warn!(
                    target: TARGET,
                    id = %notification.id,
                    kind = %notification.kind,
                    error = %err,
                    "notification delivery failed"
                );
            }
        }
    }
    debug!(target: TARGET, "notification worker stopped");
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;
    use crate::domain::entities::UserRecord;

    #[derive(Default)]
    struct RecordingPublisher {
        seen: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationPublisher for RecordingPublisher {
        async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.seen.lock().await.push(notification.clone());
            Ok(())
        }
    }

    struct StalledPublisher;

    #[async_trait]
    impl NotificationPublisher for StalledPublisher {
        async fn publish(&self, _notification: &Notification) -> Result<(), NotifyError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[tokio::test]
    async fn delivers_created_events_in_order() {
        let publisher = Arc::new(RecordingPublisher::default());
        let (dispatcher, worker) =
            NotificationDispatcher::spawn(publisher.clone(), NonZeroUsize::new(8).unwrap(), "test_topic");

        let first = user();
        let second = user();
        dispatcher.notify_created(&first);
        dispatcher.notify_created(&second);
        drop(dispatcher);
        worker.await.unwrap();

        let seen = publisher.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].kind, "user.created");
        assert_eq!(seen[0].topic, "test_topic");
        assert_eq!(seen[0].payload["id"], first.id.to_string());
        assert_eq!(seen[1].payload["email"], "ada@example.com");
        assert_eq!(seen[1].payload["id"], second.id.to_string());
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let (dispatcher, worker) = NotificationDispatcher::spawn(
            Arc::new(StalledPublisher),
            NonZeroUsize::new(1).unwrap(),
            "test_topic",
        );

        let record = user();
        let mut accepted = 0;
        for _ in 0..10 {
            let notification = Notification::created("test_topic", &record).unwrap();
            if dispatcher.dispatch(notification) {
                accepted += 1;
            }
        }
        // One event in flight with the stalled publisher, at most one queued.
        assert!(accepted <= 2, "accepted {accepted}");
        assert!(accepted >= 1);
        worker.abort();
    }
}
