//! Per-user baseline statistics with a TTL-bounded read-through cache.
//!
//! The scoring path only reads baselines. Recomputation is a separate
//! maintenance operation driven by an external scheduler; it rebuilds
//! the aggregate from the trailing 30-day window, upserts it durably
//! and replaces the cache entry whole.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreError;
use crate::store::TransactionStore;

/// Rolling statistical summary of one user's transaction amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserBaseline {
    pub user_id: String,
    pub mean_amount: f64,
    pub median_amount: f64,
    pub std_amount: f64,
    pub total_transactions: u64,
    pub last_updated: DateTime<Utc>,
}

struct CacheEntry {
    baseline: UserBaseline,
    cached_at: Instant,
}

/// Read-through cache over the durable baseline store.
///
/// Entries are keyed per user and replaced whole, so concurrent readers
/// never observe a partially written baseline.
pub struct BaselineCache {
    store: Arc<dyn TransactionStore>,
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    window: chrono::Duration,
}

impl BaselineCache {
    pub fn new(store: Arc<dyn TransactionStore>, ttl: Duration, window_days: i64) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
            ttl,
            window: chrono::Duration::days(window_days),
        }
    }

    /// Fetch a user's baseline: fresh cache entry if present, otherwise
    /// the durable store (populating the cache on a hit there).
    /// `Ok(None)` means the user has no baseline yet; store failures
    /// propagate.
    pub async fn get(&self, user_id: &str) -> Result<Option<UserBaseline>, StoreError> {
        {
            let entries = self.entries.read().unwrap();
            if let Some(entry) = entries.get(user_id) {
                if entry.cached_at.elapsed() < self.ttl {
                    return Ok(Some(entry.baseline.clone()));
                }
            }
        }

        let fetched = self.store.fetch_baseline(user_id).await?;
        if let Some(baseline) = &fetched {
            self.insert(baseline.clone());
        }
        Ok(fetched)
    }

    /// Recompute a user's baseline over the trailing window, upsert it
    /// durably and refresh the cache entry.
    ///
    /// An empty window yields a zeroed baseline that is returned but
    /// neither persisted nor cached.
    pub async fn recompute(&self, user_id: &str) -> Result<UserBaseline, StoreError> {
        let now = Utc::now();
        let amounts = self.store.amounts_since(user_id, now - self.window).await?;

        if amounts.is_empty() {
            return Ok(UserBaseline {
                user_id: user_id.to_string(),
                mean_amount: 0.0,
                median_amount: 0.0,
                std_amount: 0.0,
                total_transactions: 0,
                last_updated: now,
            });
        }

        let baseline = compute_baseline(user_id, &amounts, now);
        self.store.upsert_baseline(&baseline).await?;
        self.insert(baseline.clone());

        debug!(
            user_id = %user_id,
            transactions = baseline.total_transactions,
            mean = baseline.mean_amount,
            "Baseline recomputed"
        );

        Ok(baseline)
    }

    /// Drop a cached entry, forcing the next read through to the store.
    pub fn invalidate(&self, user_id: &str) {
        self.entries.write().unwrap().remove(user_id);
    }

    fn insert(&self, baseline: UserBaseline) {
        self.entries.write().unwrap().insert(
            baseline.user_id.clone(),
            CacheEntry {
                baseline,
                cached_at: Instant::now(),
            },
        );
    }
}

/// Mean, upper median and population standard deviation of a non-empty
/// amount sample.
fn compute_baseline(user_id: &str, amounts: &[f64], now: DateTime<Utc>) -> UserBaseline {
    let count = amounts.len();
    let mean = amounts.iter().sum::<f64>() / count as f64;

    let mut sorted = amounts.to_vec();
    sorted.sort_by(f64::total_cmp);
    let median = sorted[count / 2];

    let variance = amounts.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

    UserBaseline {
        user_id: user_id.to_string(),
        mean_amount: mean,
        median_amount: median,
        std_amount: variance.sqrt(),
        total_transactions: count as u64,
        last_updated: now,
    }
}
