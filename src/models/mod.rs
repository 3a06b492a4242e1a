//! Domain models shared across the entire gateway.

pub mod alert;
pub mod payload;
pub mod quote;
pub mod summary;

pub use alert::{EnrichedAlert, PersistedAlert, ScanType};
pub use payload::WebhookPayload;
pub use quote::{Bar, Indicators, Quote, Summary};
pub use summary::{DailySummary, ScanCount, TrackerEntry};
