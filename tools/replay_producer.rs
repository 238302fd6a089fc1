//! Replay Transaction Producer
//!
//! Generates synthetic transactions and publishes them to NATS for
//! pipeline testing: mostly routine card activity, with an optional
//! share of fraud-shaped bursts (rapid fire, far-apart locations, new
//! devices, outsized amounts).

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn};

/// City coordinates used for plausible and implausible travel patterns.
const CITIES: [(&str, f64, f64, &str); 5] = [
    ("new_york", 40.71, -74.00, "US"),
    ("london", 51.51, -0.13, "GB"),
    ("paris", 48.86, 2.35, "FR"),
    ("tokyo", 35.68, 139.69, "JP"),
    ("sydney", -33.87, 151.21, "AU"),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Location {
    latitude: f64,
    longitude: f64,
    country: String,
}

/// Transaction structure matching the pipeline's expected format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transaction {
    transaction_id: String,
    user_id: String,
    merchant_id: String,
    amount: f64,
    currency: String,
    timestamp: chrono::DateTime<Utc>,
    device_id: Option<String>,
    ip_address: Option<String>,
    location: Option<Location>,
}

struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// A routine transaction: familiar device, modest amount, home city.
    fn generate_routine(&mut self) -> Transaction {
        self.transaction_counter += 1;
        let user = self.rng.gen_range(1..50);
        let (_, lat, lon, country) = CITIES[user % CITIES.len()];

        Transaction {
            transaction_id: format!("tx_{:012}", self.transaction_counter),
            user_id: format!("user_{user:04}"),
            merchant_id: format!("merchant_{}", self.rng.gen_range(1..200)),
            amount: self.rng.gen_range(5.0..300.0),
            currency: "USD".to_string(),
            timestamp: Utc::now(),
            device_id: Some(format!("dev_{user:04}_0")),
            ip_address: Some(self.random_ip()),
            location: Some(Location {
                latitude: lat + self.rng.gen_range(-0.05..0.05),
                longitude: lon + self.rng.gen_range(-0.05..0.05),
                country: country.to_string(),
            }),
        }
    }

    /// A fraud-shaped transaction: unseen device, large amount, and a
    /// location far from the user's home city.
    fn generate_suspicious(&mut self) -> Transaction {
        self.transaction_counter += 1;
        let user = self.rng.gen_range(1..50);
        let (_, lat, lon, country) = CITIES[(user + 2) % CITIES.len()];

        Transaction {
            transaction_id: format!("tx_{:012}", self.transaction_counter),
            user_id: format!("user_{user:04}"),
            merchant_id: format!("merchant_{}", self.rng.gen_range(1..200)),
            amount: self.rng.gen_range(2000.0..15000.0),
            currency: "USD".to_string(),
            timestamp: Utc::now(),
            device_id: Some(format!("dev_{:08x}", self.rng.gen::<u32>())),
            ip_address: Some(self.random_ip()),
            location: Some(Location {
                latitude: lat,
                longitude: lon,
                country: country.to_string(),
            }),
        }
    }

    fn random_ip(&mut self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.rng.gen_range(1..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(0..255),
            self.rng.gen_range(1..255)
        )
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("replay_producer=info".parse()?),
        )
        .init();

    info!("Starting Replay Transaction Producer");

    let args: Vec<String> = std::env::args().collect();
    let nats_url = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("transactions");
    let count: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(100);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        count = count,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(count, fraud_rate, delay_ms).await;
        }
    };

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    let mut routine_count = 0;
    let mut suspicious_count = 0;

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            suspicious_count += 1;
            generator.generate_suspicious()
        } else {
            routine_count += 1;
            generator.generate_routine()
        };

        let payload = serde_json::to_vec(&transaction)?;
        client.publish(subject.to_string(), payload.into()).await?;

        if (i + 1) % 10 == 0 {
            info!(
                "Published {}/{} transactions ({} routine, {} suspicious)",
                i + 1,
                count,
                routine_count,
                suspicious_count
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Published {} transactions ({} routine, {} suspicious)",
        count, routine_count, suspicious_count
    );

    Ok(())
}

async fn run_dry_mode(count: u64, fraud_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let transaction = if rng.gen_bool(fraud_rate) {
            generator.generate_suspicious()
        } else {
            generator.generate_routine()
        };

        let json = serde_json::to_string_pretty(&transaction)?;

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample transaction {}:\n{}", i + 1, json);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
