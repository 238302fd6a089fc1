//! Scoring service: two-model ensemble with heuristic degradation and
//! atomic hot-swap.

use std::path::Path;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ScoringConfig;
use crate::error::PipelineError;
use crate::models::loader::{ArtifactSet, ModelLoader};
use crate::models::scorer::{AnomalyScorer, FraudClassifier};
use crate::types::Features;

const BASE_MODEL_VERSION: &str = "1.0.0";

/// Ensemble weights for the two sub-scores. Not required to sum to 1,
/// though doing so keeps the ensemble inside [0, 1] on its own.
#[derive(Debug, Clone, Copy)]
pub struct EnsembleWeights {
    pub unsupervised: f64,
    pub supervised: f64,
}

impl From<&ScoringConfig> for EnsembleWeights {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            unsupervised: config.unsupervised_weight,
            supervised: config.supervised_weight,
        }
    }
}

/// Scores produced for one transaction. Created fresh per request and
/// never fed back into pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPrediction {
    /// Ensembled fraud score, [0, 1]
    pub fraud_score: f64,
    /// Unsupervised anomaly sub-score, [0, 1]
    pub unsupervised_score: f64,
    /// Supervised classifier sub-score, [0, 1]
    pub supervised_score: f64,
    /// Version of the model state that produced the scores
    pub model_version: String,
}

/// Both scorers and the version string, replaced as one unit on
/// hot-swap. In-flight predictions finish on their snapshot.
struct ModelState {
    anomaly: Arc<AnomalyScorer>,
    classifier: Arc<FraudClassifier>,
    version: String,
}

impl ModelState {
    fn from_artifacts(artifacts: ArtifactSet, version: String) -> Self {
        Self {
            anomaly: Arc::new(AnomalyScorer::from_artifact(artifacts.anomaly)),
            classifier: Arc::new(FraudClassifier::from_artifact(artifacts.classifier)),
            version,
        }
    }

    fn is_degraded(&self) -> bool {
        !(self.anomaly.is_model() && self.classifier.is_model())
    }
}

/// Turns feature vectors into ensembled fraud scores. Never fails on
/// missing artifacts; heuristic scoring takes over per missing role.
pub struct ScoringService {
    state: RwLock<Arc<ModelState>>,
    weights: EnsembleWeights,
    loader: ModelLoader,
}

impl ScoringService {
    /// Load artifacts from a directory and build the service. Missing
    /// artifacts leave the corresponding role in heuristic mode.
    pub fn new(models_dir: &str, onnx_threads: usize, weights: EnsembleWeights) -> Self {
        let loader = ModelLoader::with_threads(onnx_threads);
        let artifacts = loader.load_artifacts(models_dir);
        let state = ModelState::from_artifacts(artifacts, BASE_MODEL_VERSION.to_string());

        if state.is_degraded() {
            warn!(
                anomaly_model = state.anomaly.is_model(),
                classifier_model = state.classifier.is_model(),
                "Scoring degraded: heuristic fallback active"
            );
        } else {
            info!(version = %state.version, "Scoring service initialized with trained models");
        }

        Self {
            state: RwLock::new(Arc::new(state)),
            weights,
            loader,
        }
    }

    /// Build a service with no artifacts at all; both roles score
    /// heuristically.
    pub fn heuristic(weights: EnsembleWeights) -> Self {
        Self {
            state: RwLock::new(Arc::new(ModelState::from_artifacts(
                ArtifactSet::default(),
                BASE_MODEL_VERSION.to_string(),
            ))),
            weights,
            loader: ModelLoader::new(),
        }
    }

    /// Score one feature vector. Infallible: artifact absence and
    /// inference errors degrade to heuristics.
    pub fn predict(&self, features: &Features) -> ModelPrediction {
        let state = self.snapshot();

        let unsupervised_score = state.anomaly.score(features);
        let supervised_score = state.classifier.score(features);
        let fraud_score = (self.weights.unsupervised * unsupervised_score
            + self.weights.supervised * supervised_score)
            .clamp(0.0, 1.0);

        ModelPrediction {
            fraud_score,
            unsupervised_score,
            supervised_score,
            model_version: state.version.clone(),
        }
    }

    /// Whether any role is running on heuristics instead of a trained
    /// model.
    pub fn is_degraded(&self) -> bool {
        self.snapshot().is_degraded()
    }

    pub fn model_version(&self) -> String {
        self.snapshot().version.clone()
    }

    /// Hot-swap one or both artifacts. The new scorers and version
    /// string become visible to subsequent predictions as one unit; any
    /// load failure leaves the prior state untouched.
    pub fn update_models(
        &self,
        anomaly_path: Option<&Path>,
        classifier_path: Option<&Path>,
    ) -> Result<String, PipelineError> {
        if anomaly_path.is_none() && classifier_path.is_none() {
            return Err(PipelineError::InvalidConfiguration(
                "model update requires at least one artifact path".to_string(),
            ));
        }

        // Load replacements before touching shared state.
        let new_anomaly = anomaly_path
            .map(|path| self.loader.load_model(path, "anomaly"))
            .transpose()
            .map_err(|e| {
                PipelineError::InvalidConfiguration(format!("anomaly artifact rejected: {e}"))
            })?;
        let new_classifier = classifier_path
            .map(|path| self.loader.load_model(path, "classifier"))
            .transpose()
            .map_err(|e| {
                PipelineError::InvalidConfiguration(format!("classifier artifact rejected: {e}"))
            })?;

        let current = self.snapshot();
        let version = format!(
            "{BASE_MODEL_VERSION}-{}",
            Utc::now().format("%Y%m%d%H%M%S")
        );

        let next = ModelState {
            anomaly: match new_anomaly {
                Some(model) => Arc::new(AnomalyScorer::Model(RwLock::new(model))),
                None => current.anomaly.clone(),
            },
            classifier: match new_classifier {
                Some(model) => Arc::new(FraudClassifier::Model(RwLock::new(model))),
                None => current.classifier.clone(),
            },
            version: version.clone(),
        };

        *self.state.write().unwrap() = Arc::new(next);
        info!(version = %version, "Model artifacts hot-swapped");
        Ok(version)
    }

    fn snapshot(&self) -> Arc<ModelState> {
        self.state.read().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_weights() -> EnsembleWeights {
        EnsembleWeights {
            unsupervised: 0.3,
            supervised: 0.7,
        }
    }

    #[test]
    fn test_heuristic_service_scores_quiet_transaction() {
        let service = ScoringService::heuristic(default_weights());
        let features = Features {
            device_frequency: 3,
            ..Features::default()
        };

        let prediction = service.predict(&features);
        // Heuristics: anomaly 0.0, classifier base 0.1.
        assert!((prediction.unsupervised_score - 0.0).abs() < 1e-9);
        assert!((prediction.supervised_score - 0.1).abs() < 1e-9);
        assert!((prediction.fraud_score - 0.07).abs() < 1e-9);
        assert_eq!(prediction.model_version, "1.0.0");
    }

    #[test]
    fn test_ensemble_is_weighted_sum_of_sub_scores() {
        let service = ScoringService::heuristic(EnsembleWeights {
            unsupervised: 0.4,
            supervised: 0.6,
        });
        let features = Features {
            geo_time_inconsistency_score: 1.0,
            device_frequency: 0,
            ..Features::default()
        };

        let prediction = service.predict(&features);
        let expected = 0.4 * prediction.unsupervised_score + 0.6 * prediction.supervised_score;
        assert!((prediction.fraud_score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_ensemble_clamps_to_unit_interval() {
        // Weights summing above one can push the raw combination past 1.
        let service = ScoringService::heuristic(EnsembleWeights {
            unsupervised: 1.5,
            supervised: 1.5,
        });
        let features = Features {
            tx_count_1m: 10,
            tx_count_5m: 12,
            geo_time_inconsistency_score: 1.0,
            amount_deviation_from_mean: 5000.0,
            amount_percentile: 0.99,
            device_frequency: 0,
            ..Features::default()
        };

        let prediction = service.predict(&features);
        assert_eq!(prediction.fraud_score, 1.0);
    }

    #[test]
    fn test_missing_artifacts_reported_as_degraded() {
        let service = ScoringService::new("/nonexistent/models", 1, default_weights());
        assert!(service.is_degraded());
        assert_eq!(service.model_version(), "1.0.0");
    }

    #[test]
    fn test_failed_swap_leaves_state_unchanged() {
        let service = ScoringService::heuristic(default_weights());

        let err = service
            .update_models(Some(Path::new("/nonexistent/anomaly.onnx")), None)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));

        assert_eq!(service.model_version(), "1.0.0");
        assert!(service.is_degraded());
    }

    #[test]
    fn test_swap_requires_an_artifact_path() {
        let service = ScoringService::heuristic(default_weights());
        assert!(service.update_models(None, None).is_err());
    }
}
