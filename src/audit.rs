//! Audit trail for scored transactions.
//!
//! One record per scored transaction, carrying all three scores, the
//! decision and the threshold used. Publishing is fire-and-forget: an
//! audit failure is logged and never fails the scoring response.

use async_nats::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::decision::{Action, Decision};
use crate::models::inference::ModelPrediction;

/// Audit record for one scored transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub transaction_id: String,
    pub fraud_score: f64,
    pub unsupervised_score: f64,
    pub supervised_score: f64,
    pub model_version: String,
    pub decision: Action,
    pub threshold_used: f64,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(transaction_id: &str, prediction: &ModelPrediction, decision: &Decision) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            fraud_score: prediction.fraud_score,
            unsupervised_score: prediction.unsupervised_score,
            supervised_score: prediction.supervised_score,
            model_version: prediction.model_version.clone(),
            decision: decision.action,
            threshold_used: decision.threshold_used,
            timestamp: Utc::now(),
        }
    }
}

/// Publishes audit records to the audit collaborator.
#[derive(Clone)]
pub struct AuditLogger {
    client: Client,
    subject: String,
}

impl AuditLogger {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
        }
    }

    /// Publish one audit record. Failures are logged, never propagated.
    pub async fn log(&self, record: &AuditRecord) {
        let payload = match serde_json::to_vec(record) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "Failed to serialize audit record"
                );
                return;
            }
        };

        match self
            .client
            .publish(self.subject.clone(), payload.into())
            .await
        {
            Ok(()) => {
                debug!(
                    transaction_id = %record.transaction_id,
                    decision = %record.decision,
                    "Audit record published"
                );
            }
            Err(e) => {
                error!(
                    transaction_id = %record.transaction_id,
                    error = %e,
                    "Failed to publish audit record"
                );
            }
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}
