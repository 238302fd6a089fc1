//! Decision engine: converts a fraud score into an actionable outcome.
//!
//! Classification is a pure function of the prediction and the current
//! threshold pair. Thresholds and the cost matrix are the engine's only
//! mutable state; both are swapped whole so readers never observe a torn
//! pair.

pub mod calibrate;

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DecisionConfig;
use crate::error::PipelineError;
use crate::models::inference::ModelPrediction;
use crate::types::alert::AlertPriority;

pub use calibrate::CalibrationResult;

/// Review-band scores at or above this are medium priority.
const MEDIUM_PRIORITY_SCORE: f64 = 0.70;

/// Routing outcome for a scored transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Approve,
    Review,
    Block,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Approve => write!(f, "approve"),
            Action::Review => write!(f, "review"),
            Action::Block => write!(f, "block"),
        }
    }
}

/// The approve/block threshold pair. Invariant: 0 <= approve < block <= 1.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Thresholds {
    pub approve: f64,
    pub block: f64,
}

impl Thresholds {
    pub fn new(approve: f64, block: f64) -> Result<Self, PipelineError> {
        let thresholds = Self { approve, block };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(&self.approve)
            || !(0.0..=1.0).contains(&self.block)
            || self.approve >= self.block
        {
            return Err(PipelineError::InvalidConfiguration(format!(
                "thresholds must satisfy 0 <= approve < block <= 1, got approve={}, block={}",
                self.approve, self.block
            )));
        }
        Ok(())
    }
}

/// Misclassification costs used by threshold calibration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostMatrix {
    /// Cost of blocking a legitimate transaction
    pub false_positive_cost: f64,

    /// Cost of approving a fraudulent transaction
    pub false_negative_cost: f64,
}

impl CostMatrix {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.false_positive_cost > 0.0 && self.false_negative_cost > 0.0) {
            return Err(PipelineError::InvalidConfiguration(format!(
                "cost matrix entries must be positive, got fp={}, fn={}",
                self.false_positive_cost, self.false_negative_cost
            )));
        }
        Ok(())
    }
}

/// Outcome of classifying one prediction. Derived purely from the
/// prediction and the thresholds in force at classification time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub fraud_score: f64,
    pub threshold_used: f64,
    pub confidence: f64,
}

/// Classifies predictions against the current thresholds and owns
/// threshold/cost-matrix state for the service lifetime.
pub struct DecisionEngine {
    thresholds: RwLock<Thresholds>,
    cost_matrix: RwLock<CostMatrix>,
    high_value_threshold: f64,
}

impl DecisionEngine {
    pub fn new(
        thresholds: Thresholds,
        cost_matrix: CostMatrix,
        high_value_threshold: f64,
    ) -> Result<Self, PipelineError> {
        thresholds.validate()?;
        cost_matrix.validate()?;
        Ok(Self {
            thresholds: RwLock::new(thresholds),
            cost_matrix: RwLock::new(cost_matrix),
            high_value_threshold,
        })
    }

    pub fn from_config(config: &DecisionConfig) -> Result<Self, PipelineError> {
        Self::new(
            Thresholds {
                approve: config.approve_threshold,
                block: config.block_threshold,
            },
            CostMatrix {
                false_positive_cost: config.false_positive_cost,
                false_negative_cost: config.false_negative_cost,
            },
            config.high_value_threshold,
        )
    }

    /// Classify a prediction. Scores equal to a threshold land on the
    /// higher side.
    pub fn classify(&self, prediction: &ModelPrediction) -> Decision {
        let thresholds = *self.thresholds.read().unwrap();
        let score = prediction.fraud_score;

        let (action, threshold_used, confidence) = if score >= thresholds.block {
            let confidence = if thresholds.block >= 1.0 {
                1.0
            } else {
                ((score - thresholds.block) / (1.0 - thresholds.block)).clamp(0.0, 1.0)
            };
            (Action::Block, thresholds.block, confidence)
        } else if score >= thresholds.approve {
            let confidence = (score - thresholds.approve) / (thresholds.block - thresholds.approve);
            (Action::Review, thresholds.approve, confidence)
        } else {
            let confidence = if thresholds.approve <= 0.0 {
                1.0
            } else {
                1.0 - score / thresholds.approve
            };
            (Action::Approve, thresholds.approve, confidence)
        };

        Decision {
            action,
            fraud_score: score,
            threshold_used,
            confidence,
        }
    }

    /// Alert eligibility: reviewed and blocked transactions raise alerts.
    pub fn should_alert(decision: &Decision) -> bool {
        matches!(decision.action, Action::Review | Action::Block)
    }

    /// Alert priority, computed once at alert-creation time.
    pub fn priority(&self, decision: &Decision, amount: f64) -> AlertPriority {
        if decision.action == Action::Block || amount > self.high_value_threshold {
            AlertPriority::High
        } else if decision.fraud_score >= MEDIUM_PRIORITY_SCORE {
            AlertPriority::Medium
        } else {
            AlertPriority::Low
        }
    }

    /// Current threshold pair, read as one consistent snapshot.
    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read().unwrap()
    }

    pub fn cost_matrix(&self) -> CostMatrix {
        *self.cost_matrix.read().unwrap()
    }

    /// Replace the threshold pair. Rejects invalid pairs and leaves the
    /// prior values in force.
    pub fn update_thresholds(&self, approve: f64, block: f64) -> Result<(), PipelineError> {
        let next = Thresholds { approve, block };
        next.validate()?;
        *self.thresholds.write().unwrap() = next;
        info!(approve = approve, block = block, "Thresholds updated");
        Ok(())
    }

    /// Replace the cost matrix. Rejects non-positive costs.
    pub fn update_cost_matrix(&self, cost_matrix: CostMatrix) -> Result<(), PipelineError> {
        cost_matrix.validate()?;
        *self.cost_matrix.write().unwrap() = cost_matrix;
        info!(
            false_positive_cost = cost_matrix.false_positive_cost,
            false_negative_cost = cost_matrix.false_negative_cost,
            "Cost matrix updated"
        );
        Ok(())
    }

    /// Offline grid search for the cheapest threshold pair over a labeled
    /// validation set. Returns a recommendation; engine state is untouched.
    pub fn calibrate(
        &self,
        validation: &[(f64, bool)],
        cost_matrix: &CostMatrix,
    ) -> CalibrationResult {
        calibrate::calibrate_thresholds(self.thresholds(), validation, cost_matrix)
    }
}
