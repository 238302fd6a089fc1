//! NATS consumer for incoming transactions

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscribes to the transaction subject fed by the ingestion
/// collaborator.
pub struct TransactionConsumer {
    client: Client,
    subject: String,
}

impl TransactionConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Subscribe to the transaction subject.
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self.client.subscribe(self.subject.clone()).await?;
        info!(subject = %self.subject, "Subscribed to transaction subject");
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
