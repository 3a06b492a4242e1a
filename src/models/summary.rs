//! # models::summary
//!
//! The Tracker's per-symbol state and the end-of-day digest record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::EnrichedAlert;

/// Intraday tracking state for one symbol, keyed by symbol for the current
/// trading day.
///
/// `alert_time` and `alert_price` are fixed at first insert; everything else
/// is last-write-wins across repeat alerts and refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerEntry {
    pub symbol: String,
    pub alert_time: DateTime<Utc>,
    /// Close at the moment of the first alert of the day.
    pub alert_price: f64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub stop_loss: f64,
    pub sma20: Option<f64>,
    pub scan_name: Option<String>,
    pub current_price: f64,
    /// Current vs alert price, in percent.
    pub percent_change: f64,
    pub hit_stop_loss: bool,
}

impl TrackerEntry {
    /// Build a fresh entry from an enriched alert.
    pub fn from_alert(alert: &EnrichedAlert) -> Self {
        Self {
            symbol: alert.symbol.clone(),
            alert_time: alert.received_at,
            alert_price: alert.close,
            open_price: alert.open,
            high_price: alert.high,
            low_price: alert.low,
            stop_loss: alert.stop_loss,
            sma20: alert.sma20,
            scan_name: alert.scan_name.clone(),
            current_price: alert.close,
            percent_change: 0.0,
            hit_stop_loss: false,
        }
    }

    /// Fold a repeat alert for the same symbol into this entry.  Content is
    /// last-write-wins; `alert_time` and `alert_price` stay untouched.
    pub fn absorb(&mut self, alert: &EnrichedAlert) {
        self.open_price = alert.open;
        self.high_price = alert.high;
        self.low_price = alert.low;
        self.stop_loss = alert.stop_loss;
        self.sma20 = alert.sma20;
        self.scan_name = alert.scan_name.clone();
    }

    /// Apply a fresh price observation.
    pub fn update_price(&mut self, current: f64) {
        self.current_price = current;
        self.percent_change = if self.alert_price == 0.0 {
            0.0
        } else {
            (current - self.alert_price) / self.alert_price * 100.0
        };
        self.hit_stop_loss = current < self.stop_loss;
    }
}

/// Per-scan tally inside the digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanCount {
    pub scan_name: String,
    pub count: usize,
}

/// One short line per symbol inside the digest's top/worst listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformerLine {
    pub symbol: String,
    pub percent_change: f64,
    pub hit_stop_loss: bool,
}

/// The end-of-day performance digest.  One per trading day; regenerating for
/// the same date replaces the previous record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total_alerts: usize,
    pub winners: usize,
    pub losers: usize,
    pub stopped_out: usize,
    /// winners / total, in percent.  Zero when nothing was tracked.
    pub win_rate: f64,
    pub best_performer: Option<String>,
    pub worst_performer: Option<String>,
    pub top_performers: Vec<PerformerLine>,
    pub worst_performers: Vec<PerformerLine>,
    pub scan_breakdown: Vec<ScanCount>,
    /// The rendered digest message as sent to the chat platform.
    pub message_text: String,
}
