//! Alert records handed to the alerting collaborator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decision::Decision;

/// Alert priority, computed once when the alert is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    High,
    Medium,
    Low,
}

/// Review lifecycle state. Everything past `Pending` belongs to the
/// analyst workflow outside this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Pending,
    Reviewed,
    Resolved,
}

/// A pending alert for a flagged transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique alert identifier
    pub alert_id: String,

    /// Flagged transaction
    pub transaction_id: String,

    /// The decision that triggered the alert
    pub decision: Decision,

    /// Human-readable explanation summary
    pub summary: String,

    /// Priority at creation time; not re-derived later
    pub priority: AlertPriority,

    /// Review state, always `Pending` at creation
    pub status: AlertStatus,

    /// Alert creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a pending alert for a flagged transaction.
    pub fn new(transaction_id: &str, decision: Decision, priority: AlertPriority) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id: transaction_id.to_string(),
            decision,
            summary: String::new(),
            priority,
            status: AlertStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Attach the explanation summary.
    pub fn with_summary(mut self, summary: String) -> Self {
        self.summary = summary;
        self
    }
}
