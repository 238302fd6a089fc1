//! Fraud Scoring Pipeline - Main Entry Point
//!
//! Consumes transactions from NATS, scores them through the pipeline and
//! publishes alerts and audit records. Transactions are processed by a
//! bounded pool of parallel workers.

use anyhow::Result;
use fraud_scoring_engine::{
    audit::AuditLogger,
    config::AppConfig,
    consumer::TransactionConsumer,
    decision::DecisionEngine,
    features::{BaselineCache, FeatureEngine},
    metrics::{MetricsReporter, PipelineMetrics},
    models::{EnsembleWeights, ScoringService},
    pipeline::ScoringPipeline,
    producer::AlertProducer,
    store::{MemoryStore, TransactionStore},
    Transaction,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fraud_scoring_engine=info".parse()?),
        )
        .init();

    info!("Starting Fraud Scoring Pipeline");

    // Load configuration
    let config = AppConfig::load()?;
    info!(
        approve_threshold = config.decision.approve_threshold,
        block_threshold = config.decision.block_threshold,
        unsupervised_weight = config.scoring.unsupervised_weight,
        supervised_weight = config.scoring.supervised_weight,
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    // Historical store and baseline cache. The in-memory store backs
    // development; a durable store implements the same trait in
    // production deployments.
    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let baselines = BaselineCache::new(
        store.clone(),
        Duration::from_secs(config.baseline.cache_ttl_secs),
        config.baseline.window_days,
    );
    let feature_engine = FeatureEngine::new(store.clone(), baselines);

    // Scoring service: trained artifacts when present, heuristics when
    // not.
    let scoring = Arc::new(ScoringService::new(
        &config.models.models_dir,
        config.models.onnx_threads,
        EnsembleWeights::from(&config.scoring),
    ));
    if scoring.is_degraded() {
        warn!("Running in degraded mode: heuristic scoring active");
    }

    let decisions = Arc::new(DecisionEngine::from_config(&config.decision)?);

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url).await?;
    info!(url = %config.nats.url, "Connected to NATS");

    let consumer = TransactionConsumer::new(client.clone(), &config.nats.transaction_subject);
    let alerts = AlertProducer::new(client.clone(), &config.nats.alert_subject);
    let audit = AuditLogger::new(client.clone(), &config.nats.audit_subject);

    let pipeline = Arc::new(
        ScoringPipeline::new(feature_engine, scoring, decisions)
            .with_alerts(alerts)
            .with_audit(audit),
    );

    // Baseline maintenance: the external scheduler publishes user ids to
    // recompute; the scoring path itself never triggers recomputation.
    {
        let client = client.clone();
        let subject = config.nats.baseline_subject.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            let mut subscription = match client.subscribe(subject.clone()).await {
                Ok(sub) => sub,
                Err(e) => {
                    error!(error = %e, "Failed to subscribe to baseline subject");
                    return;
                }
            };
            info!(subject = %subject, "Listening for baseline recompute requests");

            while let Some(message) = subscription.next().await {
                let user_id = String::from_utf8_lossy(&message.payload).trim().to_string();
                if user_id.is_empty() {
                    continue;
                }
                match pipeline.features().baselines().recompute(&user_id).await {
                    Ok(baseline) => debug!(
                        user_id = %user_id,
                        transactions = baseline.total_transactions,
                        "Baseline recomputed"
                    ),
                    Err(e) => warn!(user_id = %user_id, error = %e, "Baseline recompute failed"),
                }
            }
        });
    }

    // Start metrics reporter (prints a summary every 30 seconds)
    let metrics_clone = metrics.clone();
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, 30);
        reporter.start().await;
    });

    // Parallel processing with a bounded worker pool
    let num_workers = config.pipeline.workers;
    let semaphore = Arc::new(Semaphore::new(num_workers));
    let processed_count = Arc::new(AtomicU64::new(0));

    info!(
        workers = num_workers,
        subject = %config.nats.transaction_subject,
        alerts = %config.nats.alert_subject,
        "Starting transaction processing loop"
    );

    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        let permit = semaphore.clone().acquire_owned().await?;

        let store = store.clone();
        let pipeline = pipeline.clone();
        let metrics = metrics.clone();
        let processed_count = processed_count.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();

            match serde_json::from_slice::<Transaction>(&message.payload) {
                Ok(transaction) => {
                    let tx_id = transaction.transaction_id.clone();

                    // Ingest before scoring; the half-open history
                    // windows keep the transaction from counting
                    // against itself.
                    if let Err(e) = store.record(&transaction).await {
                        error!(transaction_id = %tx_id, error = %e, "Failed to record transaction");
                        drop(permit);
                        return;
                    }

                    match pipeline.score(&transaction).await {
                        Ok(outcome) => {
                            let processing_time = start_time.elapsed();
                            metrics.record_scored(
                                processing_time,
                                outcome.prediction.fraud_score,
                                &outcome.decision.action.to_string(),
                            );
                            if let Some(priority) = outcome.priority {
                                metrics.record_alert(
                                    &format!("{priority:?}").to_lowercase(),
                                );
                                info!(
                                    transaction_id = %tx_id,
                                    fraud_score = outcome.prediction.fraud_score,
                                    action = %outcome.decision.action,
                                    priority = ?priority,
                                    processing_time_us = processing_time.as_micros(),
                                    "Transaction flagged"
                                );
                            } else {
                                debug!(
                                    transaction_id = %tx_id,
                                    fraud_score = outcome.prediction.fraud_score,
                                    processing_time_us = processing_time.as_micros(),
                                    "Transaction approved"
                                );
                            }

                            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;
                            if count % 100 == 0 {
                                let stats = metrics.processing_stats();
                                info!(
                                    processed = count,
                                    throughput = format!("{:.1} tx/s", metrics.throughput()),
                                    avg_latency_us = stats.mean_us,
                                    "Processing milestone"
                                );
                            }
                        }
                        Err(e) => {
                            error!(transaction_id = %tx_id, error = %e, "Scoring failed");
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to deserialize transaction");
                }
            }

            drop(permit);
        });
    }

    info!("Pipeline shutting down...");
    metrics.print_summary();

    Ok(())
}
