//! Notification publishers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::info;

use crate::application::notify::{Notification, NotificationPublisher, NotifyError};

use super::error::InfraError;

/// Publisher used when no broker is configured: events only reach the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl NotificationPublisher for LogPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            target: "shopkeep::notify",
            id = %notification.id,
            topic = %notification.topic,
            kind = %notification.kind,
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}

/// Delivers each notification as a JSON `POST` to a broker endpoint.
#[derive(Debug, Clone)]
pub struct WebhookPublisher {
    client: Client,
    endpoint: Url,
}

impl WebhookPublisher {
    pub fn new(endpoint: Url, request_timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(request_timeout)
            .build()
            .map_err(|err| InfraError::publisher(err.to_string()))?;
        Ok(Self { client, endpoint })
    }

    fn user_agent() -> &'static str {
        concat!("shopkeep/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl NotificationPublisher for WebhookPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(notification)
            .send()
            .await
            .map_err(|err| NotifyError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            message: format!("{status}: {body}"),
        })
    }
}
