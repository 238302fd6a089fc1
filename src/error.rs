//! Error taxonomy for the scoring pipeline.
//!
//! Scoring requests either complete with a decision or fail with one of
//! these categories. Absence of trained models is deliberately *not* an
//! error: the scoring service degrades to heuristics instead.

use thiserror::Error;

/// Failures from the historical-transaction store or the baseline cache.
///
/// `Unavailable` means the backing store could not be reached at all;
/// `Query` means the store answered but the query itself failed. Neither
/// is ever converted into zero-valued features.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),
}

/// Categorized pipeline errors surfaced to callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed transaction input. No state is mutated; the core does
    /// not retry.
    #[error("invalid transaction: {0}")]
    Validation(String),

    /// Historical store or cache unavailable during feature computation.
    /// Propagated to the caller, which owns the retry policy.
    #[error("historical data access failed: {0}")]
    DataAccess(#[from] StoreError),

    /// Threshold or cost-matrix update violating invariants. The update
    /// is rejected and prior configuration retained.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Alert or audit persistence failure. Local to the side effect:
    /// the pipeline reports it through the audit channel and never
    /// fails the scoring response over it.
    #[error("persistence failed: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_wraps_into_data_access() {
        let err: PipelineError = StoreError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, PipelineError::DataAccess(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
