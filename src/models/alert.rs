//! # models::alert
//!
//! [`EnrichedAlert`] is the central record of the pipeline: produced once by
//! the Enricher, then handed — immutably — to the Formatter, Store, Tracker,
//! Analytics and Status Monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of the upstream scan, affecting Enricher filters and the
/// Formatter's advisory footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Default,
    OpenEqualsLow,
    Custom,
}

impl ScanType {
    /// Classify from the scan name the webhook carried.
    ///
    /// Any scan whose name contains `open=low` (case-insensitive) gets the
    /// stricter open-equals-low treatment; other named scans are `Custom`
    /// and an unnamed trigger is `Default`.
    pub fn from_scan_name(scan_name: Option<&str>) -> Self {
        match scan_name {
            Some(name) if name.to_lowercase().contains("open=low") => ScanType::OpenEqualsLow,
            Some(_) => ScanType::Custom,
            None => ScanType::Default,
        }
    }
}

/// A scan trigger after enrichment with live market data and the derived
/// protective exit.  Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedAlert {
    pub symbol: String,
    pub scan_name: Option<String>,
    pub scan_type: ScanType,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub sma20: Option<f64>,
    /// Protective exit, always ≤ day-low (see `engine::stop_loss`).
    pub stop_loss: f64,
    /// Close vs open, in percent.  Absent when `open` is zero.
    pub percent_change: Option<f64>,
    /// Distance from close down to the stop, in percent of close.
    /// Absent when `close` is zero.
    pub sl_distance_pct: Option<f64>,
    pub received_at: DateTime<Utc>,
}

impl EnrichedAlert {
    /// Stop distance, computing it from the price fields when the stored
    /// value is absent.  Used by the batch formatter for its sort key.
    pub fn sl_distance_or_compute(&self) -> f64 {
        self.sl_distance_pct.unwrap_or_else(|| {
            if self.close == 0.0 {
                f64::MAX
            } else {
                (self.close - self.stop_loss) / self.close * 100.0
            }
        })
    }
}

/// What the Store persists: the full enriched record plus an opaque id.
/// Append-only; never mutated after the insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedAlert {
    pub id: Uuid,
    #[serde(flatten)]
    pub alert: EnrichedAlert,
}

impl PersistedAlert {
    pub fn new(alert: EnrichedAlert) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert,
        }
    }
}
