//! Per-role scorers: a loaded ONNX model or the heuristic fallback.
//!
//! The variant is chosen once at load or hot-swap time and dispatched
//! through the same `score` call. A runtime inference failure on the
//! model path degrades that single call to the heuristic rather than
//! failing the request.

use std::sync::RwLock;

use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use tracing::{debug, warn};

use crate::models::loader::LoadedModel;
use crate::types::Features;

/// Unsupervised anomaly scorer. The model role wraps an isolation-forest
/// style artifact whose raw decision score goes negative for outliers.
pub enum AnomalyScorer {
    Model(RwLock<LoadedModel>),
    Heuristic,
}

impl AnomalyScorer {
    pub fn from_artifact(artifact: Option<LoadedModel>) -> Self {
        match artifact {
            Some(model) => Self::Model(RwLock::new(model)),
            None => Self::Heuristic,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Anomaly score in [0, 1], higher meaning more anomalous.
    pub fn score(&self, features: &Features) -> f64 {
        match self {
            Self::Model(lock) => {
                let raw = match lock.write() {
                    Ok(mut model) => run_raw_score(&mut model, features),
                    Err(e) => Err(anyhow::anyhow!("lock error: {e}")),
                };
                match raw {
                    // More negative raw score means more anomalous.
                    Ok(raw) => (0.5 - raw).clamp(0.0, 1.0),
                    Err(e) => {
                        warn!(error = %e, "Anomaly model inference failed, using heuristic");
                        heuristic_anomaly_score(features)
                    }
                }
            }
            Self::Heuristic => heuristic_anomaly_score(features),
        }
    }
}

/// Supervised fraud classifier. The model role wraps a binary classifier
/// exposing the positive-class probability.
pub enum FraudClassifier {
    Model(RwLock<LoadedModel>),
    Heuristic,
}

impl FraudClassifier {
    pub fn from_artifact(artifact: Option<LoadedModel>) -> Self {
        match artifact {
            Some(model) => Self::Model(RwLock::new(model)),
            None => Self::Heuristic,
        }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Fraud probability in [0, 1].
    pub fn score(&self, features: &Features) -> f64 {
        match self {
            Self::Model(lock) => {
                let probability = match lock.write() {
                    Ok(mut model) => run_fraud_probability(&mut model, features),
                    Err(e) => Err(anyhow::anyhow!("lock error: {e}")),
                };
                match probability {
                    Ok(p) => p.clamp(0.0, 1.0),
                    Err(e) => {
                        warn!(error = %e, "Classifier inference failed, using heuristic");
                        heuristic_fraud_probability(features)
                    }
                }
            }
            Self::Heuristic => heuristic_fraud_probability(features),
        }
    }
}

/// Heuristic anomaly score used when no trained anomaly model is active.
pub fn heuristic_anomaly_score(features: &Features) -> f64 {
    let mut score = 0.0;

    if features.tx_count_1m > 5 {
        score += 0.3;
    } else if features.tx_count_5m > 10 {
        score += 0.2;
    }

    score += features.geo_time_inconsistency_score * 0.4;

    if features.amount_deviation_from_mean.abs() > 1000.0 {
        score += 0.2;
    }

    if features.device_frequency == 0 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Heuristic fraud probability used when no trained classifier is active.
pub fn heuristic_fraud_probability(features: &Features) -> f64 {
    let mut score: f64 = 0.1;

    if features.tx_count_1m >= 3 {
        score += 0.3;
    }
    if features.tx_count_5m >= 8 {
        score += 0.2;
    }

    if features.geo_time_inconsistency_score > 0.8 {
        score += 0.4;
    }

    if features.amount_percentile > 0.95 {
        score += 0.2;
    }

    if features.device_frequency == 0 && features.amount_percentile > 0.8 {
        score += 0.3;
    }

    score.min(1.0)
}

fn feature_tensor(features: &Features) -> Result<Tensor<f32>> {
    let vector = features.to_vector();
    let shape = vec![1_i64, vector.len() as i64];
    Tensor::from_array((shape, vector)).context("Failed to create input tensor")
}

/// Run the anomaly model and extract its raw decision score.
fn run_raw_score(model: &mut LoadedModel, features: &Features) -> Result<f64> {
    let input = feature_tensor(features)?;
    let outputs = model
        .session
        .run(ort::inputs![&model.input_name => input])?;

    // Isolation-forest exports carry a "label" output next to the raw
    // scores tensor; take the first non-label float value.
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            if let Some(&raw) = data.first() {
                debug!(model = %model.name, raw = raw, "Extracted raw anomaly score");
                return Ok(f64::from(raw));
            }
        }
    }

    anyhow::bail!("no score tensor in anomaly model output")
}

/// Run the classifier and extract the positive-class probability.
/// Handles tensor outputs as well as the seq(map) shape some gradient
/// boosting exports produce.
fn run_fraud_probability(model: &mut LoadedModel, features: &Features) -> Result<f64> {
    let input = feature_tensor(features)?;
    let model_name = model.name.clone();
    let output_name = model.output_name.clone();
    let outputs = model
        .session
        .run(ort::inputs![&model.input_name => input])?;

    if let Some(output) = outputs.get(&output_name) {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            return Ok(positive_class_from_tensor(&shape, data));
        }
        if DynSequenceValueType::can_downcast(&output.dtype()) {
            if let Ok(probability) = positive_class_from_sequence_map(output, &model_name) {
                return Ok(probability);
            }
        }
    }

    // Fallback: scan every non-label output.
    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            debug!(model = %model_name, output = %name, "Extracted probability from tensor (fallback)");
            return Ok(positive_class_from_tensor(&shape, data));
        }
        if DynSequenceValueType::can_downcast(&output.dtype()) {
            if let Ok(probability) = positive_class_from_sequence_map(&output, &model_name) {
                return Ok(probability);
            }
        }
    }

    anyhow::bail!("no probability output in classifier model")
}

/// Positive-class probability from a tensor shaped [batch, classes],
/// [batch, 1] or [classes].
fn positive_class_from_tensor(shape: &ort::tensor::Shape, data: &[f32]) -> f64 {
    let dims: Vec<i64> = shape.iter().copied().collect();

    if dims.len() == 2 {
        let classes = dims[1] as usize;
        if classes >= 2 {
            return f64::from(data[1]);
        } else if classes == 1 {
            return f64::from(data[0]);
        }
    } else if dims.len() == 1 {
        let classes = dims[0] as usize;
        if classes >= 2 {
            return f64::from(data[1]);
        } else if classes == 1 {
            return f64::from(data[0]);
        }
    }

    data.last().map(|&v| f64::from(v)).unwrap_or(0.5)
}

/// Positive-class probability from a seq(map(int64, float)) output.
fn positive_class_from_sequence_map(
    output: &ort::value::DynValue,
    model_name: &str,
) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("failed to downcast to sequence: {e}"))?;

    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let map_value = maps.first().context("empty sequence output")?;
    let class_probabilities = map_value.try_extract_key_values::<i64, f32>()?;

    for (class_id, probability) in &class_probabilities {
        if *class_id == 1 {
            debug!(model = %model_name, probability = *probability, "Extracted probability from seq(map)");
            return Ok(f64::from(*probability));
        }
    }

    // Single-class map: invert the negative class.
    for (class_id, probability) in &class_probabilities {
        if *class_id == 0 {
            return Ok(1.0 - f64::from(*probability));
        }
    }

    anyhow::bail!("no class probability found in map output")
}
