//! Type definitions for the scoring pipeline

pub mod alert;
pub mod features;
pub mod transaction;

pub use alert::{Alert, AlertPriority, AlertStatus};
pub use features::Features;
pub use transaction::{Location, Transaction};
