//! Performance and outcome metrics for the scoring pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tracing::info;

/// Metrics collector shared across worker tasks.
pub struct PipelineMetrics {
    /// Total transactions scored
    pub transactions_scored: AtomicU64,
    /// Total alerts generated
    pub alerts_generated: AtomicU64,
    /// Decisions by action
    decisions_by_action: RwLock<HashMap<String, u64>>,
    /// Alerts by priority
    alerts_by_priority: RwLock<HashMap<String, u64>>,
    /// Per-request processing times, microseconds
    processing_times: RwLock<Vec<u64>>,
    /// Fraud-score distribution in ten buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for throughput calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            transactions_scored: AtomicU64::new(0),
            alerts_generated: AtomicU64::new(0),
            decisions_by_action: RwLock::new(HashMap::new()),
            alerts_by_priority: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record one scored transaction.
    pub fn record_scored(&self, processing_time: Duration, fraud_score: f64, action: &str) {
        self.transactions_scored.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Bound memory: keep the most recent half once full.
            if times.len() > 10_000 {
                times.drain(0..5_000);
            }
        }

        let bucket = ((fraud_score * 10.0) as usize).min(9);
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }

        if let Ok(mut by_action) = self.decisions_by_action.write() {
            *by_action.entry(action.to_string()).or_insert(0) += 1;
        }
    }

    /// Record one generated alert.
    pub fn record_alert(&self, priority: &str) {
        self.alerts_generated.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut by_priority) = self.alerts_by_priority.write() {
            *by_priority.entry(priority.to_string()).or_insert(0) += 1;
        }
    }

    /// Processing-time percentiles over the retained window.
    pub fn processing_stats(&self) -> ProcessingStats {
        let times = self.processing_times.read().unwrap();
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: sorted[(count as f64 * 0.95) as usize],
            p99_us: sorted[(count as f64 * 0.99) as usize],
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Transactions per second since startup.
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_scored.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read().unwrap()
    }

    pub fn decisions_by_action(&self) -> HashMap<String, u64> {
        self.decisions_by_action.read().unwrap().clone()
    }

    pub fn alerts_by_priority(&self) -> HashMap<String, u64> {
        self.alerts_by_priority.read().unwrap().clone()
    }

    /// Emit a summary of counters and latency percentiles.
    pub fn print_summary(&self) {
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let alerts = self.alerts_generated.load(Ordering::Relaxed);
        let alert_rate = if scored > 0 {
            alerts as f64 / scored as f64 * 100.0
        } else {
            0.0
        };
        let stats = self.processing_stats();

        info!(
            transactions = scored,
            alerts = alerts,
            alert_rate = format!("{alert_rate:.1}%"),
            throughput = format!("{:.1} tx/s", self.throughput()),
            "Pipeline summary"
        );
        info!(
            mean_us = stats.mean_us,
            p50_us = stats.p50_us,
            p95_us = stats.p95_us,
            p99_us = stats.p99_us,
            max_us = stats.max_us,
            "Processing latency"
        );

        for (action, count) in self.decisions_by_action() {
            info!(action = %action, count = count, "Decisions");
        }
        for (priority, count) in self.alerts_by_priority() {
            info!(priority = %priority, count = count, "Alerts");
        }

        let distribution = self.score_distribution();
        let total: u64 = distribution.iter().sum();
        if total > 0 {
            for (i, &count) in distribution.iter().enumerate() {
                let pct = count as f64 / total as f64 * 100.0;
                info!(
                    bucket = format!("{:.1}-{:.1}", i as f64 / 10.0, (i + 1) as f64 / 10.0),
                    count = count,
                    pct = format!("{pct:.1}%"),
                    "Score distribution"
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing-time percentile summary.
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Periodically emits the metrics summary.
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Run the periodic reporting loop.
    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
