//! Explainability engine: deterministic per-feature attribution.
//!
//! Attributions come from fixed hand-tuned importance weights scaled by
//! normalized feature values and the fraud score. A heuristic, not a
//! gradient-based method; good enough to tell an analyst where to look
//! first.

use serde::{Deserialize, Serialize};

use crate::models::inference::ModelPrediction;
use crate::types::Features;

/// Maximum entries in the ranked attribution list.
const TOP_FEATURES: usize = 5;

/// Attributions below this magnitude are left out of the summary.
const SUMMARY_THRESHOLD: f64 = 0.01;

/// How many attributions feed the summary text.
const SUMMARY_FEATURES: usize = 3;

/// Hand-tuned importance weights, in canonical feature order. Sums to 1.
const FEATURE_WEIGHTS: [(&str, f64); 11] = [
    ("tx_count_1m", 0.15),
    ("tx_count_5m", 0.12),
    ("tx_count_1h", 0.08),
    ("amount_deviation_from_mean", 0.10),
    ("amount_deviation_from_median", 0.08),
    ("amount_percentile", 0.09),
    ("device_frequency", 0.07),
    ("merchant_frequency", 0.06),
    ("geo_time_inconsistency_score", 0.18),
    ("distance_from_last_tx", 0.04),
    ("time_since_last_tx", 0.03),
];

/// Ranked attribution for one scored transaction. Ephemeral: derived on
/// demand and never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Top features by absolute contribution, descending
    pub top_features: Vec<(String, f64)>,

    /// Human-readable one-line summary
    pub summary: String,

    /// Full feature snapshot, in canonical order
    pub feature_values: Vec<(String, f64)>,
}

impl Explanation {
    /// Multi-line rendering for analyst-facing surfaces.
    pub fn render(&self) -> String {
        let mut lines = vec![self.summary.clone(), String::new()];
        lines.push("Top Contributing Factors:".to_string());

        for (i, (name, contribution)) in self.top_features.iter().enumerate() {
            let value = self
                .feature_values
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|&(_, value)| value)
                .unwrap_or(0.0);
            let display = name.replace('_', " ");
            lines.push(format!(
                "  {}. {display}: {value:.2} (contribution: {contribution:.3})",
                i + 1
            ));
        }

        lines.join("\n")
    }
}

/// Produces explanations for predictions. Pure and deterministic.
pub struct ExplainabilityEngine;

impl ExplainabilityEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn explain(&self, features: &Features, prediction: &ModelPrediction) -> Explanation {
        let values = features.named_values();

        let mut attributions: Vec<(&'static str, f64, f64)> = values
            .iter()
            .map(|&(name, value)| {
                let contribution =
                    weight_for(name) * normalized_value(name, value) * prediction.fraud_score;
                (name, value, contribution)
            })
            .collect();

        attributions.sort_by(|a, b| b.2.abs().total_cmp(&a.2.abs()));

        let top_features: Vec<(String, f64)> = attributions
            .iter()
            .take(TOP_FEATURES)
            .map(|&(name, _, contribution)| (name.to_string(), contribution))
            .collect();

        let summary = build_summary(&attributions, prediction);

        Explanation {
            top_features,
            summary,
            feature_values: values
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }
}

impl Default for ExplainabilityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn weight_for(name: &str) -> f64 {
    FEATURE_WEIGHTS
        .iter()
        .find(|(candidate, _)| *candidate == name)
        .map(|&(_, weight)| weight)
        .unwrap_or(0.05)
}

/// Map a raw feature value onto [0, 1] suspicion, per feature class.
fn normalized_value(name: &str, value: f64) -> f64 {
    match name {
        // Velocity: more is worse, saturating at 10.
        "tx_count_1m" | "tx_count_5m" | "tx_count_1h" => (value / 10.0).min(1.0),

        // Deviations: magnitude matters, saturating at 1000.
        "amount_deviation_from_mean" | "amount_deviation_from_median" => {
            (value.abs() / 1000.0).min(1.0)
        }

        // Percentile: both extremes are suspicious.
        "amount_percentile" => (value - 0.5).abs() * 2.0,

        // Frequencies: unseen is suspicious, very hot slightly less so.
        "device_frequency" | "merchant_frequency" => {
            if value == 0.0 {
                0.8
            } else if value > 20.0 {
                0.6
            } else {
                0.2
            }
        }

        "geo_time_inconsistency_score" => value,

        "distance_from_last_tx" => (value / 5000.0).min(1.0),

        // Rapid-fire follow-ups are suspicious.
        "time_since_last_tx" => {
            if value < 60.0 {
                0.8
            } else {
                0.2
            }
        }

        _ => 0.5,
    }
}

fn build_summary(attributions: &[(&'static str, f64, f64)], prediction: &ModelPrediction) -> String {
    let reasons: Vec<String> = attributions
        .iter()
        .take(SUMMARY_FEATURES)
        .filter(|(_, _, contribution)| contribution.abs() >= SUMMARY_THRESHOLD)
        .map(|&(name, value, _)| describe(name, value))
        .collect();

    if reasons.is_empty() {
        format!(
            "Fraud score: {:.2}. No significant anomalies detected.",
            prediction.fraud_score
        )
    } else {
        format!("Flagged due to: {}", reasons.join(", "))
    }
}

/// Human-readable description of one feature observation.
fn describe(name: &str, value: f64) -> String {
    match name {
        "tx_count_1m" => format!(
            "high transaction velocity ({} transactions in 1 minute)",
            value as u64
        ),
        "tx_count_5m" => format!(
            "unusual transaction frequency ({} transactions in 5 minutes)",
            value as u64
        ),
        "tx_count_1h" => format!(
            "elevated transaction rate ({} transactions in 1 hour)",
            value as u64
        ),
        "amount_deviation_from_mean" => format!(
            "unusual amount (${:.2} from user average)",
            value.abs()
        ),
        "amount_deviation_from_median" => format!(
            "atypical transaction amount (${:.2} deviation)",
            value.abs()
        ),
        "amount_percentile" => format!(
            "extreme amount ({:.0}th percentile for user)",
            value * 100.0
        ),
        "device_frequency" => {
            if value == 0.0 {
                "new device".to_string()
            } else {
                format!("device used {} times recently", value as u64)
            }
        }
        "merchant_frequency" => {
            if value == 0.0 {
                "new merchant".to_string()
            } else {
                format!("merchant used {} times recently", value as u64)
            }
        }
        "geo_time_inconsistency_score" => {
            format!("impossible travel detected (score: {value:.2})")
        }
        "distance_from_last_tx" => {
            format!("large distance from last transaction ({value:.0} km)")
        }
        "time_since_last_tx" => format!(
            "very short time since last transaction ({} seconds)",
            value as u64
        ),
        other => format!("unusual {other}"),
    }
}
