//! NATS producer for fraud alerts

use anyhow::Result;
use async_nats::Client;
use tracing::debug;

use crate::types::Alert;

/// Publishes pending alerts to the alerting collaborator.
#[derive(Clone)]
pub struct AlertProducer {
    client: Client,
    subject: String,
}

impl AlertProducer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish one alert.
    pub async fn publish(&self, alert: &Alert) -> Result<()> {
        let payload = serde_json::to_vec(alert)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;

        debug!(
            alert_id = %alert.alert_id,
            transaction_id = %alert.transaction_id,
            priority = ?alert.priority,
            "Published alert"
        );

        Ok(())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
