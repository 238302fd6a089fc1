//! Configuration for the scoring pipeline.
//!
//! Loaded from TOML as one unit; reloading means loading a fresh
//! `AppConfig` and re-applying it, so the surface (ensemble weights,
//! thresholds, cost matrix, high-value threshold, baseline cache TTL)
//! always changes together.

use anyhow::{Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;

use crate::decision::{CostMatrix, Thresholds};
use crate::error::PipelineError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub scoring: ScoringConfig,
    pub decision: DecisionConfig,
    pub baseline: BaselineConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for outgoing alerts
    pub alert_subject: String,
    /// Subject for audit records
    pub audit_subject: String,
    /// Subject for baseline recompute requests from the scheduler
    pub baseline_subject: String,
}

/// Model artifact configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing the ONNX artifacts
    pub models_dir: String,
    /// Threads for ONNX inference per session
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
}

fn default_onnx_threads() -> usize {
    1
}

/// Ensemble weight configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Weight of the unsupervised anomaly sub-score
    pub unsupervised_weight: f64,
    /// Weight of the supervised classifier sub-score
    pub supervised_weight: f64,
}

/// Decision engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionConfig {
    /// Scores below this approve
    pub approve_threshold: f64,
    /// Scores at or above this block
    pub block_threshold: f64,
    /// Cost of blocking a legitimate transaction
    pub false_positive_cost: f64,
    /// Cost of approving a fraudulent transaction
    pub false_negative_cost: f64,
    /// Amounts above this raise high-priority alerts
    pub high_value_threshold: f64,
}

/// Baseline cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BaselineConfig {
    /// Cache entry time-to-live, seconds
    pub cache_ttl_secs: u64,
    /// Trailing window for recomputation, days
    pub window_days: i64,
}

/// Worker pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Number of concurrent scoring workers
    pub workers: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field invariants a loaded configuration must
    /// satisfy.
    pub fn validate(&self) -> Result<(), PipelineError> {
        Thresholds {
            approve: self.decision.approve_threshold,
            block: self.decision.block_threshold,
        }
        .validate()?;

        CostMatrix {
            false_positive_cost: self.decision.false_positive_cost,
            false_negative_cost: self.decision.false_negative_cost,
        }
        .validate()?;

        if self.scoring.unsupervised_weight < 0.0 || self.scoring.supervised_weight < 0.0 {
            return Err(PipelineError::InvalidConfiguration(
                "ensemble weights must be non-negative".to_string(),
            ));
        }
        if self.scoring.unsupervised_weight + self.scoring.supervised_weight <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(
                "ensemble weights must not both be zero".to_string(),
            ));
        }

        if self.decision.high_value_threshold <= 0.0 {
            return Err(PipelineError::InvalidConfiguration(
                "high_value_threshold must be positive".to_string(),
            ));
        }

        if self.baseline.window_days <= 0 {
            return Err(PipelineError::InvalidConfiguration(
                "baseline window_days must be positive".to_string(),
            ));
        }

        if self.pipeline.workers == 0 {
            return Err(PipelineError::InvalidConfiguration(
                "pipeline workers must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                transaction_subject: "transactions".to_string(),
                alert_subject: "fraud.alerts".to_string(),
                audit_subject: "fraud.audit".to_string(),
                baseline_subject: "fraud.baseline.recompute".to_string(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                onnx_threads: 1,
            },
            scoring: ScoringConfig {
                unsupervised_weight: 0.3,
                supervised_weight: 0.7,
            },
            decision: DecisionConfig {
                approve_threshold: 0.50,
                block_threshold: 0.85,
                false_positive_cost: 50.0,
                false_negative_cost: 1000.0,
                high_value_threshold: 10_000.0,
            },
            baseline: BaselineConfig {
                cache_ttl_secs: 3600,
                window_days: 30,
            },
            pipeline: PipelineConfig { workers: 4 },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.decision.approve_threshold, 0.50);
        assert_eq!(config.decision.block_threshold, 0.85);
        assert_eq!(config.scoring.supervised_weight, 0.7);
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.decision.approve_threshold = 0.9;
        config.decision.block_threshold = 0.5;
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_non_positive_costs() {
        let mut config = AppConfig::default();
        config.decision.false_negative_cost = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = AppConfig::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());
    }
}
