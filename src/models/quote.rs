//! # models::quote
//!
//! Market-data shapes owned by the Quote Cache: the real-time [`Quote`],
//! historical [`Bar`]s and the derived [`Indicators`] bundle.
//!
//! Vendors routinely omit fields (a freshly listed symbol has no 10-day
//! average volume, a thin symbol has no 200 bars of history), so anything
//! that can be absent is an `Option` — readers must tolerate absence, never
//! substitute zero.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A point-in-time snapshot for one symbol, as served by the vendor's
/// real-time quote endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Last traded price. "close" intraday means the running close.
    pub close: f64,
    pub previous_close: Option<f64>,
    pub volume: f64,
    pub avg_volume_10d: Option<f64>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    /// Vendor-side quote time.
    pub timestamp: DateTime<Utc>,
}

/// One daily candle from the historical endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: f64,
}

/// Slow-moving descriptive data from the vendor's summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub symbol: String,
    pub long_name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
    pub market_cap: Option<f64>,
}

/// Indicator bundle derived from a bar series.  Never persisted on its own;
/// every field is absent when the series is too short to compute it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Indicators {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub rsi14: Option<f64>,
    /// Current volume over its 10-period average.
    pub volume_ratio: Option<f64>,
}
