//! Thin orchestrator for one transaction's trip through the pipeline:
//! features, prediction, decision, then explanation and alerting for
//! flagged outcomes.
//!
//! Side effects (alert publishing, audit logging) are local failures:
//! they are logged and never fail the scoring response.

use std::sync::Arc;

use tracing::{debug, error};

use crate::audit::{AuditLogger, AuditRecord};
use crate::decision::{Decision, DecisionEngine};
use crate::error::PipelineError;
use crate::explain::{ExplainabilityEngine, Explanation};
use crate::features::FeatureEngine;
use crate::models::inference::{ModelPrediction, ScoringService};
use crate::producer::AlertProducer;
use crate::types::{Alert, AlertPriority, Transaction};

/// Everything produced for one scored transaction.
#[derive(Debug)]
pub struct ScoringOutcome {
    pub transaction_id: String,
    pub prediction: ModelPrediction,
    pub decision: Decision,
    /// Present only for flagged (review/block) transactions
    pub explanation: Option<Explanation>,
    /// Present only when an alert was raised
    pub priority: Option<AlertPriority>,
}

/// Sequences the core components for each transaction.
pub struct ScoringPipeline {
    features: FeatureEngine,
    scoring: Arc<ScoringService>,
    decisions: Arc<DecisionEngine>,
    explainer: ExplainabilityEngine,
    alerts: Option<AlertProducer>,
    audit: Option<AuditLogger>,
}

impl ScoringPipeline {
    pub fn new(
        features: FeatureEngine,
        scoring: Arc<ScoringService>,
        decisions: Arc<DecisionEngine>,
    ) -> Self {
        Self {
            features,
            scoring,
            decisions,
            explainer: ExplainabilityEngine::new(),
            alerts: None,
            audit: None,
        }
    }

    /// Attach the alert publisher.
    pub fn with_alerts(mut self, alerts: AlertProducer) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Attach the audit logger.
    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Baseline maintenance access for the scheduler boundary.
    pub fn features(&self) -> &FeatureEngine {
        &self.features
    }

    /// Score one transaction end to end.
    ///
    /// Fails with `Validation` for malformed input or `DataAccess` when
    /// history is unreachable; alert and audit failures never surface
    /// here.
    pub async fn score(&self, tx: &Transaction) -> Result<ScoringOutcome, PipelineError> {
        tx.validate()?;

        let features = self.features.compute(tx).await?;
        let prediction = self.scoring.predict(&features);
        let decision = self.decisions.classify(&prediction);

        debug!(
            transaction_id = %tx.transaction_id,
            fraud_score = prediction.fraud_score,
            action = %decision.action,
            "Transaction classified"
        );

        let (explanation, priority) = if DecisionEngine::should_alert(&decision) {
            let explanation = self.explainer.explain(&features, &prediction);
            let priority = self.decisions.priority(&decision, tx.amount);

            if let Some(alerts) = &self.alerts {
                let alert = Alert::new(&tx.transaction_id, decision.clone(), priority)
                    .with_summary(explanation.summary.clone());
                if let Err(e) = alerts.publish(&alert).await {
                    // Local side-effect failure: reported, never unwound
                    // into the scoring response.
                    let err = PipelineError::Persistence(e.to_string());
                    error!(
                        transaction_id = %tx.transaction_id,
                        error = %err,
                        "Failed to publish alert"
                    );
                }
            }

            (Some(explanation), Some(priority))
        } else {
            (None, None)
        };

        if let Some(audit) = &self.audit {
            audit
                .log(&AuditRecord::new(&tx.transaction_id, &prediction, &decision))
                .await;
        }

        Ok(ScoringOutcome {
            transaction_id: tx.transaction_id.clone(),
            prediction,
            decision,
            explanation,
            priority,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use std::time::Duration as StdDuration;

    use crate::decision::{Action, CostMatrix, Thresholds};
    use crate::features::BaselineCache;
    use crate::models::EnsembleWeights;
    use crate::store::{MemoryStore, TransactionStore};
    use crate::types::Location;

    fn pipeline_over(store: Arc<MemoryStore>) -> ScoringPipeline {
        let baselines = BaselineCache::new(store.clone(), StdDuration::from_secs(300), 30);
        let features = FeatureEngine::new(store, baselines);
        let scoring = Arc::new(ScoringService::heuristic(EnsembleWeights {
            unsupervised: 0.3,
            supervised: 0.7,
        }));
        let decisions = Arc::new(
            DecisionEngine::new(
                Thresholds {
                    approve: 0.5,
                    block: 0.85,
                },
                CostMatrix {
                    false_positive_cost: 50.0,
                    false_negative_cost: 1000.0,
                },
                10_000.0,
            )
            .unwrap(),
        );
        ScoringPipeline::new(features, scoring, decisions)
    }

    fn located(lat: f64, lon: f64) -> Option<Location> {
        Some(Location {
            latitude: lat,
            longitude: lon,
            country: "US".to_string(),
        })
    }

    #[tokio::test]
    async fn test_first_transaction_with_known_device_approves() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        // Seed one prior use of the device so the new-device heuristics
        // stay quiet.
        let mut prior = Transaction::new("tx_0", "u2", "m1", 20.0);
        prior.device_id = Some("dev_1".to_string());
        prior.timestamp = now - Duration::hours(3);
        store.record(&prior).await.unwrap();

        let pipeline = pipeline_over(store);
        let mut tx = Transaction::new("tx_1", "u1", "m1", 50.0);
        tx.device_id = Some("dev_1".to_string());
        tx.timestamp = now;

        let outcome = pipeline.score(&tx).await.unwrap();
        assert_eq!(outcome.decision.action, Action::Approve);
        assert!(outcome.explanation.is_none());
        assert!(outcome.priority.is_none());
    }

    #[tokio::test]
    async fn test_impossible_travel_burst_is_flagged_with_explanation() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        // A burst of recent transactions plus a located prior far away.
        for i in 0..4 {
            let mut prior = Transaction::new(&format!("tx_{i}"), "u1", "m1", 30.0);
            prior.timestamp = now - Duration::seconds(20 + i);
            store.record(&prior).await.unwrap();
        }
        let mut located_prior = Transaction::new("tx_geo", "u1", "m1", 30.0);
        located_prior.timestamp = now - Duration::seconds(60);
        located_prior.location = located(40.7, -74.0); // New York
        store.record(&located_prior).await.unwrap();

        let pipeline = pipeline_over(store);
        let mut tx = Transaction::new("tx_hot", "u1", "m1", 30.0);
        tx.timestamp = now;
        tx.location = located(51.5, -0.1); // London, one minute later

        let outcome = pipeline.score(&tx).await.unwrap();
        assert_ne!(outcome.decision.action, Action::Approve);

        let explanation = outcome.explanation.expect("flagged outcome explains itself");
        assert!(explanation.summary.contains("impossible travel"));
        assert!(outcome.priority.is_some());
    }

    #[tokio::test]
    async fn test_validation_failure_short_circuits() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline_over(store);

        let tx = Transaction::new("tx_bad", "u1", "m1", -10.0);
        let err = pipeline.score(&tx).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }
}
