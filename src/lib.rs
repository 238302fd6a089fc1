//! Real-Time Fraud Scoring Pipeline
//!
//! Scores payment transactions for fraud risk and routes them to
//! approve/review/block outcomes: behavioral feature engineering over
//! transaction history, a two-model ensemble with heuristic degradation,
//! cost-aware decision thresholds, and deterministic explainability.

pub mod audit;
pub mod config;
pub mod consumer;
pub mod decision;
pub mod error;
pub mod explain;
pub mod features;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod store;
pub mod types;

pub use audit::AuditLogger;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use decision::{Action, Decision, DecisionEngine};
pub use error::{PipelineError, StoreError};
pub use explain::ExplainabilityEngine;
pub use features::{BaselineCache, FeatureEngine};
pub use models::inference::{ModelPrediction, ScoringService};
pub use pipeline::{ScoringOutcome, ScoringPipeline};
pub use producer::AlertProducer;
pub use types::{Alert, Features, Transaction};
