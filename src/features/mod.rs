//! Feature engineering: one transaction plus history in, one fixed
//! feature vector out.
//!
//! Every derived count looks strictly before the transaction's own
//! timestamp, so a transaction never counts against itself. Store
//! failures propagate as data-access errors; they are never papered
//! over with zero-valued features, since zeros are a legitimate
//! business outcome for a first-ever transaction.

pub mod baseline;
pub mod geo;

use std::sync::Arc;

use chrono::Duration;

use crate::error::PipelineError;
use crate::store::TransactionStore;
use crate::types::{Features, Transaction};

pub use baseline::{BaselineCache, UserBaseline};

/// Velocity window sizes, minutes.
const VELOCITY_WINDOWS_MIN: [i64; 3] = [1, 5, 60];

/// Lookback for device and merchant frequency, hours.
const FREQUENCY_WINDOW_HOURS: i64 = 24;

/// Derives the feature vector for incoming transactions.
pub struct FeatureEngine {
    store: Arc<dyn TransactionStore>,
    baselines: BaselineCache,
}

impl FeatureEngine {
    pub fn new(store: Arc<dyn TransactionStore>, baselines: BaselineCache) -> Self {
        Self { store, baselines }
    }

    /// Baseline access for the maintenance path (scheduled recompute).
    pub fn baselines(&self) -> &BaselineCache {
        &self.baselines
    }

    /// Compute all features for one transaction. Fails only when the
    /// historical store is unreachable.
    pub async fn compute(&self, tx: &Transaction) -> Result<Features, PipelineError> {
        let ts = tx.timestamp;

        let mut velocity = [0u32; 3];
        for (slot, minutes) in velocity.iter_mut().zip(VELOCITY_WINDOWS_MIN) {
            let count = self
                .store
                .count_by_user(&tx.user_id, ts - Duration::minutes(minutes), ts)
                .await?;
            *slot = count as u32;
        }

        let baseline = self.baselines.get(&tx.user_id).await?;
        let (deviation_mean, deviation_median, percentile) = match &baseline {
            Some(baseline) => {
                let deviation_mean = tx.amount - baseline.mean_amount;
                let deviation_median = tx.amount - baseline.median_amount;
                let percentile = if baseline.std_amount > 0.0 {
                    let z = (tx.amount - baseline.mean_amount) / baseline.std_amount;
                    // Linear remap of a ±3σ window onto [0, 1].
                    ((z + 3.0) / 6.0).clamp(0.0, 1.0)
                } else {
                    0.5
                };
                (deviation_mean, deviation_median, percentile)
            }
            None => (0.0, 0.0, 0.5),
        };

        let frequency_start = ts - Duration::hours(FREQUENCY_WINDOW_HOURS);
        let device_frequency = match &tx.device_id {
            Some(device_id) => {
                self.store
                    .count_by_device(device_id, frequency_start, ts)
                    .await? as u32
            }
            None => 0,
        };
        let merchant_frequency = self
            .store
            .count_by_user_merchant(&tx.user_id, &tx.merchant_id, frequency_start, ts)
            .await? as u32;

        let (geo_score, distance_km, elapsed_secs) = self.geo_time_features(tx).await?;

        Ok(Features {
            tx_count_1m: velocity[0],
            tx_count_5m: velocity[1],
            tx_count_1h: velocity[2],
            amount_deviation_from_mean: deviation_mean,
            amount_deviation_from_median: deviation_median,
            amount_percentile: percentile,
            device_frequency,
            merchant_frequency,
            geo_time_inconsistency_score: geo_score,
            distance_from_last_tx: distance_km,
            time_since_last_tx: elapsed_secs,
        })
    }

    /// Inconsistency score, distance and elapsed seconds against the
    /// most recent located prior transaction. All zeros when either end
    /// lacks a location.
    async fn geo_time_features(&self, tx: &Transaction) -> Result<(f64, f64, u64), PipelineError> {
        let Some(location) = &tx.location else {
            return Ok((0.0, 0.0, 0));
        };

        let Some(prior) = self
            .store
            .last_located_before(&tx.user_id, tx.timestamp)
            .await?
        else {
            return Ok((0.0, 0.0, 0));
        };

        let distance_km = geo::haversine_km(
            prior.latitude,
            prior.longitude,
            location.latitude,
            location.longitude,
        );
        let elapsed_secs = (tx.timestamp - prior.timestamp).num_seconds().max(0) as u64;
        let score = geo::inconsistency_score(distance_km, elapsed_secs);

        Ok((score, distance_km, elapsed_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::time::Duration as StdDuration;

    use crate::error::StoreError;
    use crate::store::{LocatedTransaction, MemoryStore};
    use crate::types::Location;

    fn engine_over(store: Arc<dyn TransactionStore>) -> FeatureEngine {
        let baselines = BaselineCache::new(store.clone(), StdDuration::from_secs(300), 30);
        FeatureEngine::new(store, baselines)
    }

    fn located(lat: f64, lon: f64) -> Option<Location> {
        Some(Location {
            latitude: lat,
            longitude: lon,
            country: "US".to_string(),
        })
    }

    #[tokio::test]
    async fn test_first_ever_transaction_yields_neutral_features() {
        let store = Arc::new(MemoryStore::new());
        let engine = engine_over(store);

        let mut tx = Transaction::new("tx_1", "u1", "m1", 50.0);
        tx.location = located(40.0, -74.0);

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.tx_count_1m, 0);
        assert_eq!(features.tx_count_5m, 0);
        assert_eq!(features.tx_count_1h, 0);
        assert_eq!(features.device_frequency, 0);
        assert_eq!(features.merchant_frequency, 0);
        assert_eq!(features.amount_deviation_from_mean, 0.0);
        assert_eq!(features.amount_deviation_from_median, 0.0);
        assert_eq!(features.amount_percentile, 0.5);
        assert_eq!(features.geo_time_inconsistency_score, 0.0);
        assert_eq!(features.distance_from_last_tx, 0.0);
        assert_eq!(features.time_since_last_tx, 0);
    }

    #[tokio::test]
    async fn test_velocity_counts_respect_windows() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        for (id, secs_ago) in [("a", 30i64), ("b", 240), ("c", 1800), ("d", 7200)] {
            let mut prior = Transaction::new(id, "u1", "m1", 20.0);
            prior.timestamp = now - Duration::seconds(secs_ago);
            store.record(&prior).await.unwrap();
        }

        let engine = engine_over(store);
        let mut tx = Transaction::new("tx", "u1", "m1", 20.0);
        tx.timestamp = now;

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.tx_count_1m, 1); // 30s
        assert_eq!(features.tx_count_5m, 2); // 30s, 240s
        assert_eq!(features.tx_count_1h, 3); // 30s, 240s, 1800s
        // 24h merchant window still sees all four priors.
        assert_eq!(features.merchant_frequency, 4);
    }

    #[tokio::test]
    async fn test_device_frequency_skips_query_without_device() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut prior = Transaction::new("a", "u1", "m1", 20.0);
        prior.device_id = Some("dev_1".to_string());
        prior.timestamp = now - Duration::hours(2);
        store.record(&prior).await.unwrap();

        let engine = engine_over(store);

        let mut with_device = Transaction::new("tx1", "u1", "m1", 20.0);
        with_device.device_id = Some("dev_1".to_string());
        with_device.timestamp = now;
        let features = engine.compute(&with_device).await.unwrap();
        assert_eq!(features.device_frequency, 1);

        let mut without_device = Transaction::new("tx2", "u1", "m1", 20.0);
        without_device.timestamp = now;
        let features = engine.compute(&without_device).await.unwrap();
        assert_eq!(features.device_frequency, 0);
    }

    #[tokio::test]
    async fn test_baseline_drives_amount_features() {
        let store = Arc::new(MemoryStore::new());
        let baseline = UserBaseline {
            user_id: "u1".to_string(),
            mean_amount: 100.0,
            median_amount: 90.0,
            std_amount: 50.0,
            total_transactions: 40,
            last_updated: Utc::now(),
        };
        store.upsert_baseline(&baseline).await.unwrap();

        let engine = engine_over(store);
        let tx = Transaction::new("tx", "u1", "m1", 200.0);

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.amount_deviation_from_mean, 100.0);
        assert_eq!(features.amount_deviation_from_median, 110.0);
        // z = 2, percentile = (2 + 3) / 6
        assert!((features.amount_percentile - 5.0 / 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_zero_std_baseline_gives_neutral_percentile() {
        let store = Arc::new(MemoryStore::new());
        let baseline = UserBaseline {
            user_id: "u1".to_string(),
            mean_amount: 25.0,
            median_amount: 25.0,
            std_amount: 0.0,
            total_transactions: 3,
            last_updated: Utc::now(),
        };
        store.upsert_baseline(&baseline).await.unwrap();

        let engine = engine_over(store);
        let tx = Transaction::new("tx", "u1", "m1", 500.0);

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.amount_percentile, 0.5);
        assert_eq!(features.amount_deviation_from_mean, 475.0);
    }

    #[tokio::test]
    async fn test_impossible_travel_scores_max_inconsistency() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        // Prior transaction roughly 111 km south, 60 seconds earlier.
        let mut prior = Transaction::new("a", "u1", "m1", 20.0);
        prior.timestamp = now - Duration::seconds(60);
        prior.location = located(39.0, -74.0);
        store.record(&prior).await.unwrap();

        let engine = engine_over(store);
        let mut tx = Transaction::new("tx", "u1", "m1", 20.0);
        tx.timestamp = now;
        tx.location = located(40.0, -74.0);

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.geo_time_inconsistency_score, 1.0);
        assert!((features.distance_from_last_tx - 111.0).abs() < 2.0);
        assert_eq!(features.time_since_last_tx, 60);
    }

    #[tokio::test]
    async fn test_unlocated_transaction_skips_geo() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();

        let mut prior = Transaction::new("a", "u1", "m1", 20.0);
        prior.timestamp = now - Duration::seconds(60);
        prior.location = located(39.0, -74.0);
        store.record(&prior).await.unwrap();

        let engine = engine_over(store);
        let mut tx = Transaction::new("tx", "u1", "m1", 20.0);
        tx.timestamp = now;

        let features = engine.compute(&tx).await.unwrap();
        assert_eq!(features.geo_time_inconsistency_score, 0.0);
        assert_eq!(features.distance_from_last_tx, 0.0);
    }

    /// Store stub whose every query fails.
    struct DownStore;

    #[async_trait]
    impl TransactionStore for DownStore {
        async fn record(&self, _tx: &Transaction) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn count_by_user(
            &self,
            _user: &str,
            _from: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn count_by_device(
            &self,
            _device: &str,
            _from: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn count_by_user_merchant(
            &self,
            _user: &str,
            _merchant: &str,
            _from: DateTime<Utc>,
            _until: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn last_located_before(
            &self,
            _user: &str,
            _before: DateTime<Utc>,
        ) -> Result<Option<LocatedTransaction>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn amounts_since(
            &self,
            _user: &str,
            _since: DateTime<Utc>,
        ) -> Result<Vec<f64>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn fetch_baseline(&self, _user: &str) -> Result<Option<UserBaseline>, StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
        async fn upsert_baseline(&self, _baseline: &UserBaseline) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("down".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_surfaces_as_data_access_error() {
        let engine = engine_over(Arc::new(DownStore));
        let tx = Transaction::new("tx", "u1", "m1", 20.0);

        let err = engine.compute(&tx).await.unwrap_err();
        assert!(matches!(err, PipelineError::DataAccess(_)));
    }
}
