//! Transaction data structures for the scoring pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Geographic location attached to a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    /// Latitude in degrees, [-90, 90]
    pub latitude: f64,

    /// Longitude in degrees, [-180, 180]
    pub longitude: f64,

    /// ISO 3166-1 alpha-2 country code
    pub country: String,
}

/// A payment transaction to be scored for fraud risk.
///
/// Created by the ingestion collaborator and immutable once created;
/// the pipeline only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier
    pub transaction_id: String,

    /// Account the transaction was made from
    pub user_id: String,

    /// Merchant the transaction was made to
    pub merchant_id: String,

    /// Transaction amount, strictly positive
    pub amount: f64,

    /// ISO 4217 currency code (3 letters)
    pub currency: String,

    /// When the transaction occurred
    pub timestamp: DateTime<Utc>,

    /// Device fingerprint, if the channel provides one
    #[serde(default)]
    pub device_id: Option<String>,

    /// Originating IP, if known
    #[serde(default)]
    pub ip_address: Option<String>,

    /// Geolocation, if known
    #[serde(default)]
    pub location: Option<Location>,
}

impl Transaction {
    /// Create a transaction with the required fields. Optional channel
    /// data starts empty.
    pub fn new(transaction_id: &str, user_id: &str, merchant_id: &str, amount: f64) -> Self {
        Self {
            transaction_id: transaction_id.to_string(),
            user_id: user_id.to_string(),
            merchant_id: merchant_id.to_string(),
            amount,
            currency: "USD".to_string(),
            timestamp: Utc::now(),
            device_id: None,
            ip_address: None,
            location: None,
        }
    }

    /// Validate the boundary invariants the ingestion collaborator
    /// promises: positive amount, 3-letter currency, coordinates in
    /// range and a 2-letter country when a location is present.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.amount.is_finite() && self.amount > 0.0) {
            return Err(PipelineError::Validation(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PipelineError::Validation(format!(
                "currency must be a 3-letter code, got {:?}",
                self.currency
            )));
        }

        if let Some(location) = &self.location {
            if !(-90.0..=90.0).contains(&location.latitude) {
                return Err(PipelineError::Validation(format!(
                    "latitude out of range: {}",
                    location.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&location.longitude) {
                return Err(PipelineError::Validation(format!(
                    "longitude out of range: {}",
                    location.longitude
                )));
            }
            if location.country.len() != 2
                || !location.country.chars().all(|c| c.is_ascii_alphabetic())
            {
                return Err(PipelineError::Validation(format!(
                    "country must be a 2-letter code, got {:?}",
                    location.country
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_serialization() {
        let tx = Transaction::new("tx_123", "user_1", "merchant_9", 49.99);

        let json = serde_json::to_string(&tx).unwrap();
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();

        assert_eq!(tx.transaction_id, deserialized.transaction_id);
        assert_eq!(tx.user_id, deserialized.user_id);
        assert_eq!(tx.amount, deserialized.amount);
        assert!(deserialized.location.is_none());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        let mut tx = Transaction::new("tx_1", "user_1", "merchant_1", 100.0);
        tx.location = Some(Location {
            latitude: 48.85,
            longitude: 2.35,
            country: "FR".to_string(),
        });
        assert!(tx.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let tx = Transaction::new("tx_1", "user_1", "merchant_1", 0.0);
        assert!(matches!(tx.validate(), Err(PipelineError::Validation(_))));

        let tx = Transaction::new("tx_1", "user_1", "merchant_1", -5.0);
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_currency() {
        let mut tx = Transaction::new("tx_1", "user_1", "merchant_1", 10.0);
        tx.currency = "US".to_string();
        assert!(tx.validate().is_err());

        tx.currency = "U5D".to_string();
        assert!(tx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_coordinates() {
        let mut tx = Transaction::new("tx_1", "user_1", "merchant_1", 10.0);
        tx.location = Some(Location {
            latitude: 91.0,
            longitude: 0.0,
            country: "US".to_string(),
        });
        assert!(tx.validate().is_err());

        tx.location = Some(Location {
            latitude: 0.0,
            longitude: -181.0,
            country: "US".to_string(),
        });
        assert!(tx.validate().is_err());

        tx.location = Some(Location {
            latitude: 0.0,
            longitude: 0.0,
            country: "USA".to_string(),
        });
        assert!(tx.validate().is_err());
    }
}
