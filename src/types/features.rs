//! Derived behavioral features for a single transaction.
//!
//! One `Features` value is computed per transaction and never mutated
//! afterwards. The field order here is the canonical feature order: the
//! model input vector and the explainability engine both follow it.

use serde::{Deserialize, Serialize};

/// Canonical feature names, in vector order.
pub const FEATURE_NAMES: [&str; 11] = [
    "tx_count_1m",
    "tx_count_5m",
    "tx_count_1h",
    "amount_deviation_from_mean",
    "amount_deviation_from_median",
    "amount_percentile",
    "device_frequency",
    "merchant_frequency",
    "geo_time_inconsistency_score",
    "distance_from_last_tx",
    "time_since_last_tx",
];

/// Feature vector computed for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Features {
    /// Prior transactions by this user in the last minute
    pub tx_count_1m: u32,

    /// Prior transactions by this user in the last 5 minutes
    pub tx_count_5m: u32,

    /// Prior transactions by this user in the last hour
    pub tx_count_1h: u32,

    /// Amount minus the user's baseline mean (0 without a baseline)
    pub amount_deviation_from_mean: f64,

    /// Amount minus the user's baseline median (0 without a baseline)
    pub amount_deviation_from_median: f64,

    /// Amount percentile within the user's baseline, [0, 1]; 0.5 is the
    /// neutral prior when no baseline exists
    pub amount_percentile: f64,

    /// Transactions from this device in the trailing 24 hours
    pub device_frequency: u32,

    /// Transactions by this user at this merchant in the trailing 24 hours
    pub merchant_frequency: u32,

    /// Implausible-travel score in [0, 1]
    pub geo_time_inconsistency_score: f64,

    /// Great-circle distance to the previous located transaction, km
    pub distance_from_last_tx: f64,

    /// Seconds since the previous located transaction
    pub time_since_last_tx: u64,
}

impl Features {
    /// Feature values paired with their canonical names, in vector order.
    pub fn named_values(&self) -> Vec<(&'static str, f64)> {
        vec![
            (FEATURE_NAMES[0], f64::from(self.tx_count_1m)),
            (FEATURE_NAMES[1], f64::from(self.tx_count_5m)),
            (FEATURE_NAMES[2], f64::from(self.tx_count_1h)),
            (FEATURE_NAMES[3], self.amount_deviation_from_mean),
            (FEATURE_NAMES[4], self.amount_deviation_from_median),
            (FEATURE_NAMES[5], self.amount_percentile),
            (FEATURE_NAMES[6], f64::from(self.device_frequency)),
            (FEATURE_NAMES[7], f64::from(self.merchant_frequency)),
            (FEATURE_NAMES[8], self.geo_time_inconsistency_score),
            (FEATURE_NAMES[9], self.distance_from_last_tx),
            (FEATURE_NAMES[10], self.time_since_last_tx as f64),
        ]
    }

    /// Model input vector, in canonical order.
    pub fn to_vector(&self) -> Vec<f32> {
        self.named_values().into_iter().map(|(_, v)| v as f32).collect()
    }

    /// Number of features in the vector.
    pub fn count() -> usize {
        FEATURE_NAMES.len()
    }
}

impl Default for Features {
    /// The feature vector of a first-ever transaction: zero counts, zero
    /// deviations, neutral percentile, no geo signal.
    fn default() -> Self {
        Self {
            tx_count_1m: 0,
            tx_count_5m: 0,
            tx_count_1h: 0,
            amount_deviation_from_mean: 0.0,
            amount_deviation_from_median: 0.0,
            amount_percentile: 0.5,
            device_frequency: 0,
            merchant_frequency: 0,
            geo_time_inconsistency_score: 0.0,
            distance_from_last_tx: 0.0,
            time_since_last_tx: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_matches_name_order() {
        let features = Features {
            tx_count_1m: 2,
            tx_count_5m: 4,
            tx_count_1h: 8,
            amount_percentile: 0.9,
            ..Features::default()
        };

        let vector = features.to_vector();
        assert_eq!(vector.len(), Features::count());
        assert_eq!(vector[0], 2.0);
        assert_eq!(vector[1], 4.0);
        assert_eq!(vector[2], 8.0);
        assert_eq!(vector[5], 0.9);
    }

    #[test]
    fn test_named_values_align_with_canonical_names() {
        let features = Features::default();
        let named = features.named_values();
        assert_eq!(named.len(), FEATURE_NAMES.len());
        for ((name, _), expected) in named.iter().zip(FEATURE_NAMES.iter()) {
            assert_eq!(name, expected);
        }
    }

    #[test]
    fn test_default_is_neutral_first_transaction() {
        let features = Features::default();
        assert_eq!(features.tx_count_1m, 0);
        assert_eq!(features.amount_percentile, 0.5);
        assert_eq!(features.geo_time_inconsistency_score, 0.0);
    }
}
