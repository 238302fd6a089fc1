//! Boundary to the durable historical-transaction store.
//!
//! Feature computation only ever reads through this trait; baseline
//! maintenance additionally upserts recomputed aggregates. All time
//! windows are half-open `[from, until)` so the transaction being scored
//! is never counted against itself.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::features::baseline::UserBaseline;
use crate::types::Transaction;

pub use memory::MemoryStore;

/// Timestamp and coordinates of a prior located transaction.
#[derive(Debug, Clone, Copy)]
pub struct LocatedTransaction {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Range queries and baseline persistence over the historical store.
///
/// Unavailability surfaces as `StoreError`; implementations must never
/// answer a failed query with fabricated empty results.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Record an ingested transaction.
    async fn record(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Count a user's transactions with timestamp in `[from, until)`.
    async fn count_by_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Count transactions from a device with timestamp in `[from, until)`.
    async fn count_by_device(
        &self,
        device_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// Count a user's transactions at one merchant in `[from, until)`.
    async fn count_by_user_merchant(
        &self,
        user_id: &str,
        merchant_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    /// The user's most recent located transaction strictly before
    /// `before`, if any.
    async fn last_located_before(
        &self,
        user_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<LocatedTransaction>, StoreError>;

    /// Amounts of the user's transactions with timestamp >= `since`.
    async fn amounts_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<f64>, StoreError>;

    /// Fetch the durably stored baseline for a user, distinguishing
    /// "absent" (`Ok(None)`) from "store down" (`Err`).
    async fn fetch_baseline(&self, user_id: &str) -> Result<Option<UserBaseline>, StoreError>;

    /// Durably upsert a recomputed baseline.
    async fn upsert_baseline(&self, baseline: &UserBaseline) -> Result<(), StoreError>;
}
