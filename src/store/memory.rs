//! In-memory transaction store.
//!
//! Backs the binary in development and the test suite. Holds the full
//! transaction history in process memory; the production deployment
//! substitutes a store-backed implementation behind the same trait.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::features::baseline::UserBaseline;
use crate::store::{LocatedTransaction, TransactionStore};
use crate::types::Transaction;

#[derive(Default)]
struct Inner {
    transactions: Vec<Transaction>,
    baselines: HashMap<String, UserBaseline>,
}

/// Process-local implementation of [`TransactionStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded transactions.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TransactionStore for MemoryStore {
    async fn record(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.inner
            .write()
            .unwrap()
            .transactions
            .push(transaction.clone());
        Ok(())
    }

    async fn count_by_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id && tx.timestamp >= from && tx.timestamp < until)
            .count() as u64)
    }

    async fn count_by_device(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| {
                tx.device_id.as_deref() == Some(device_id)
                    && tx.timestamp >= from
                    && tx.timestamp < until
            })
            .count() as u64)
    }

    async fn count_by_user_merchant(
        &self,
        user_id: &str,
        merchant_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.merchant_id == merchant_id
                    && tx.timestamp >= from
                    && tx.timestamp < until
            })
            .count() as u64)
    }

    async fn last_located_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<LocatedTransaction>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id && tx.timestamp < before && tx.location.is_some())
            .max_by_key(|tx| tx.timestamp)
            .and_then(|tx| {
                tx.location.as_ref().map(|location| LocatedTransaction {
                    timestamp: tx.timestamp,
                    latitude: location.latitude,
                    longitude: location.longitude,
                })
            }))
    }

    async fn amounts_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<f64>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .transactions
            .iter()
            .filter(|tx| tx.user_id == user_id && tx.timestamp >= since)
            .map(|tx| tx.amount)
            .collect())
    }

    async fn fetch_baseline(&self, user_id: &str) -> Result<Option<UserBaseline>, StoreError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.baselines.get(user_id).cloned())
    }

    async fn upsert_baseline(&self, baseline: &UserBaseline) -> Result<(), StoreError> {
        self.inner
            .write()
            .unwrap()
            .baselines
            .insert(baseline.user_id.clone(), baseline.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn tx_at(id: &str, user: &str, offset_secs: i64, base: DateTime<Utc>) -> Transaction {
        let mut tx = Transaction::new(id, user, "merchant_1", 25.0);
        tx.timestamp = base + Duration::seconds(offset_secs);
        tx
    }

    #[tokio::test]
    async fn test_count_window_is_half_open() {
        let store = MemoryStore::new();
        let base = Utc::now();

        store.record(&tx_at("tx_1", "u1", -60, base)).await.unwrap();
        store.record(&tx_at("tx_2", "u1", -30, base)).await.unwrap();
        store.record(&tx_at("tx_3", "u1", 0, base)).await.unwrap();

        // [base - 60s, base): includes -60 and -30, excludes the
        // transaction at `base` itself.
        let count = store
            .count_by_user("u1", base - Duration::seconds(60), base)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_last_located_before_picks_most_recent() {
        let store = MemoryStore::new();
        let base = Utc::now();

        let mut early = tx_at("tx_1", "u1", -300, base);
        early.location = Some(crate::types::Location {
            latitude: 40.0,
            longitude: -74.0,
            country: "US".to_string(),
        });
        let mut late = tx_at("tx_2", "u1", -60, base);
        late.location = Some(crate::types::Location {
            latitude: 51.5,
            longitude: -0.1,
            country: "GB".to_string(),
        });
        let unlocated = tx_at("tx_3", "u1", -10, base);

        store.record(&early).await.unwrap();
        store.record(&late).await.unwrap();
        store.record(&unlocated).await.unwrap();

        let prior = store.last_located_before("u1", base).await.unwrap().unwrap();
        assert_eq!(prior.latitude, 51.5);
        assert_eq!(prior.timestamp, base - Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_baseline_roundtrip() {
        let store = MemoryStore::new();
        assert!(store.fetch_baseline("u1").await.unwrap().is_none());

        let baseline = UserBaseline {
            user_id: "u1".to_string(),
            mean_amount: 50.0,
            median_amount: 45.0,
            std_amount: 10.0,
            total_transactions: 12,
            last_updated: Utc::now(),
        };
        store.upsert_baseline(&baseline).await.unwrap();

        let fetched = store.fetch_baseline("u1").await.unwrap().unwrap();
        assert_eq!(fetched.mean_amount, 50.0);
        assert_eq!(fetched.total_transactions, 12);
    }
}
