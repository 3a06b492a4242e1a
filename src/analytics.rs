//! # analytics — long-horizon rollups
//!
//! Three bucket families (by symbol, by scan name, by trading day) fed once
//! per webhook-originated alert.  Averages are streaming means; success
//! rates are computed on read.  State checkpoints to
//! `performance_analytics.json` every 5 recorded alerts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::clock;
use crate::models::EnrichedAlert;

const CHECKPOINT_EVERY: u64 = 5;

/// One incrementally updated rollup bucket.
///
/// Invariant: `total_alerts == wins + losses + stopped_out` — a stopped-out
/// alert is never also a win, whatever its percent change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyticsBucket {
    pub total_alerts: u64,
    pub wins: u64,
    pub losses: u64,
    pub stopped_out: u64,
    pub avg_performance: f64,
    pub best_gain: Option<f64>,
    pub worst_loss: Option<f64>,
}

impl AnalyticsBucket {
    fn record(&mut self, performance: f64, stopped: bool) {
        self.total_alerts += 1;
        if stopped {
            self.stopped_out += 1;
        } else if performance > 0.0 {
            self.wins += 1;
        } else {
            self.losses += 1;
        }

        // Streaming mean: avg ← (avg·(n−1) + x) / n
        let n = self.total_alerts as f64;
        self.avg_performance = (self.avg_performance * (n - 1.0) + performance) / n;

        self.best_gain = Some(self.best_gain.map_or(performance, |b| b.max(performance)));
        self.worst_loss = Some(self.worst_loss.map_or(performance, |w| w.min(performance)));
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_alerts == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_alerts as f64 * 100.0
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AnalyticsData {
    by_symbol: HashMap<String, AnalyticsBucket>,
    by_scan: HashMap<String, AnalyticsBucket>,
    /// Keyed by trading-day string `YYYY-MM-DD`.
    by_date: HashMap<String, AnalyticsBucket>,
    #[serde(default)]
    recorded_total: u64,
}

/// Read-model returned by the analytics endpoint.
#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub period: String,
    pub totals: AnalyticsBucket,
    pub success_rate: f64,
    pub by_symbol: HashMap<String, AnalyticsBucket>,
    pub by_scan: HashMap<String, AnalyticsBucket>,
    pub by_date: HashMap<String, AnalyticsBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Day,
    Week,
    Month,
    All,
}

impl Period {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "day" => Period::Day,
            "week" => Period::Week,
            "month" => Period::Month,
            _ => Period::All,
        }
    }

    fn days_back(self) -> Option<i64> {
        match self {
            Period::Day => Some(1),
            Period::Week => Some(7),
            Period::Month => Some(30),
            Period::All => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::All => "all",
        }
    }
}

pub struct Analytics {
    path: PathBuf,
    inner: Mutex<AnalyticsData>,
}

impl Analytics {
    pub async fn init(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;
        let path = data_dir.join("performance_analytics.json");

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => AnalyticsData::default(),
        };

        Ok(Self {
            path,
            inner: Mutex::new(data),
        })
    }

    /// Record one webhook-originated alert into all three bucket families.
    /// Called exactly once per alert; tracker refreshes never reach here.
    pub async fn record(&self, alert: &EnrichedAlert) {
        let performance = alert.percent_change.unwrap_or(0.0);
        let day = clock::trading_day_of(alert.received_at).to_string();
        let scan = alert
            .scan_name
            .clone()
            .unwrap_or_else(|| "(unnamed)".to_string());

        let needs_checkpoint = {
            let mut data = self.inner.lock().await;
            data.by_symbol
                .entry(alert.symbol.clone())
                .or_default()
                .record(performance, false);
            data.by_scan.entry(scan).or_default().record(performance, false);
            data.by_date.entry(day).or_default().record(performance, false);
            data.recorded_total += 1;
            data.recorded_total % CHECKPOINT_EVERY == 0
        };

        if needs_checkpoint {
            self.checkpoint().await;
        }
    }

    /// Mark a tracked symbol as stopped out across all three bucket
    /// families for today.  Fired from the digest path so the long-horizon
    /// stats see protective exits.
    pub async fn record_stop_out(&self, symbol: &str, scan_name: Option<&str>) {
        let day = clock::trading_day().to_string();
        let scan = scan_name.unwrap_or("(unnamed)").to_string();
        let mut data = self.inner.lock().await;

        // The symbol's own bucket says whether its recorded outcome was a
        // loss or a win; the scan and date buckets flip the same kind so a
        // different symbol's outcome is not disturbed.
        let from_loss = data
            .by_symbol
            .get(symbol)
            .map(|b| b.losses > 0)
            .unwrap_or(true);

        reclassify_stop_out(data.by_symbol.get_mut(symbol), from_loss);
        reclassify_stop_out(data.by_scan.get_mut(&scan), from_loss);
        reclassify_stop_out(data.by_date.get_mut(&day), from_loss);
    }

    pub async fn report(&self, period: Period) -> AnalyticsReport {
        let data = self.inner.lock().await;

        let cutoff = period
            .days_back()
            .map(|days| clock::trading_day() - Duration::days(days - 1));
        let by_date: HashMap<String, AnalyticsBucket> = data
            .by_date
            .iter()
            .filter(|(key, _)| match cutoff {
                Some(cutoff) => key
                    .parse::<chrono::NaiveDate>()
                    .map(|d| d >= cutoff)
                    .unwrap_or(false),
                None => true,
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut totals = AnalyticsBucket::default();
        let mut weighted_sum = 0.0;
        for bucket in by_date.values() {
            totals.wins += bucket.wins;
            totals.losses += bucket.losses;
            totals.stopped_out += bucket.stopped_out;
            totals.total_alerts += bucket.total_alerts;
            weighted_sum += bucket.avg_performance * bucket.total_alerts as f64;
            totals.best_gain = match (totals.best_gain, bucket.best_gain) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
            totals.worst_loss = match (totals.worst_loss, bucket.worst_loss) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        if totals.total_alerts > 0 {
            totals.avg_performance = weighted_sum / totals.total_alerts as f64;
        }

        AnalyticsReport {
            period: period.label().to_string(),
            success_rate: totals.success_rate(),
            totals,
            by_symbol: data.by_symbol.clone(),
            by_scan: data.by_scan.clone(),
            by_date,
        }
    }

    /// Persist the current buckets; errors are logged, never raised.
    pub async fn checkpoint(&self) {
        let raw = {
            let data = self.inner.lock().await;
            serde_json::to_string_pretty(&*data)
        };
        match raw {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&self.path, raw).await {
                    warn!(error = %e, "analytics checkpoint failed");
                }
            }
            Err(e) => warn!(error = %e, "analytics serialize failed"),
        }
    }
}

/// Move one prior outcome into `stopped_out`, preferring the kind the
/// symbol actually recorded.  Total stays wins + losses + stopped.
fn reclassify_stop_out(bucket: Option<&mut AnalyticsBucket>, from_loss: bool) {
    let Some(bucket) = bucket else { return };
    if from_loss && bucket.losses > 0 {
        bucket.losses -= 1;
        bucket.stopped_out += 1;
    } else if bucket.wins > 0 {
        bucket.wins -= 1;
        bucket.stopped_out += 1;
    } else if bucket.losses > 0 {
        bucket.losses -= 1;
        bucket.stopped_out += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ScanType;
    use chrono::Utc;

    fn tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("stockalert-analytics-{}", uuid::Uuid::new_v4()))
    }

    fn alert(symbol: &str, scan: &str, pct: f64) -> EnrichedAlert {
        EnrichedAlert {
            symbol: symbol.to_string(),
            scan_name: Some(scan.to_string()),
            scan_type: ScanType::Custom,
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 100.0 + pct,
            volume: 1_000.0,
            sma20: None,
            stop_loss: 98.0,
            percent_change: Some(pct),
            sl_distance_pct: Some(2.0),
            received_at: Utc::now(),
        }
    }

    fn assert_consistent(bucket: &AnalyticsBucket) {
        assert_eq!(
            bucket.total_alerts,
            bucket.wins + bucket.losses + bucket.stopped_out
        );
    }

    #[tokio::test]
    async fn stop_out_reclassifies_all_three_families() {
        let analytics = Analytics::init(&tmp_dir()).await.unwrap();
        analytics.record(&alert("TCS.NS", "Momo", -1.0)).await;

        analytics.record_stop_out("TCS.NS", Some("Momo")).await;

        let report = analytics.report(Period::All).await;
        for bucket in [
            &report.by_symbol["TCS.NS"],
            &report.by_scan["Momo"],
            &report.by_date[&clock::trading_day().to_string()],
        ] {
            assert_eq!(bucket.stopped_out, 1);
            assert_eq!(bucket.wins, 0);
            assert_eq!(bucket.losses, 0);
            assert_consistent(bucket);
        }
    }

    #[tokio::test]
    async fn stop_out_of_a_loser_leaves_other_symbols_wins_intact() {
        let analytics = Analytics::init(&tmp_dir()).await.unwrap();
        analytics.record(&alert("WIN.NS", "X", 2.0)).await;
        analytics.record(&alert("LOSE.NS", "X", -1.0)).await;

        analytics.record_stop_out("LOSE.NS", Some("X")).await;

        let report = analytics.report(Period::All).await;
        let day = &report.by_date[&clock::trading_day().to_string()];
        assert_eq!(day.wins, 1, "the winner's outcome must not be flipped");
        assert_eq!(day.losses, 0);
        assert_eq!(day.stopped_out, 1);
        assert_consistent(day);

        let scan = &report.by_scan["X"];
        assert_eq!(scan.wins, 1);
        assert_eq!(scan.stopped_out, 1);
        assert_consistent(scan);
    }

    #[tokio::test]
    async fn stop_out_of_a_winner_reclassifies_its_own_win() {
        let analytics = Analytics::init(&tmp_dir()).await.unwrap();
        // Up since the alert, yet it later pierced the stop.
        analytics.record(&alert("GAP.NS", "X", 3.0)).await;

        analytics.record_stop_out("GAP.NS", Some("X")).await;

        let report = analytics.report(Period::All).await;
        let bucket = &report.by_symbol["GAP.NS"];
        assert_eq!(bucket.wins, 0);
        assert_eq!(bucket.stopped_out, 1);
        assert_consistent(bucket);
    }

    #[test]
    fn streaming_mean_matches_batch_mean() {
        let mut bucket = AnalyticsBucket::default();
        let xs = [2.0, -1.0, 4.5, 0.0, 3.0];
        for &x in &xs {
            bucket.record(x, false);
        }
        let batch_mean = xs.iter().sum::<f64>() / xs.len() as f64;
        assert!((bucket.avg_performance - batch_mean).abs() < 1e-9);
        assert_eq!(bucket.best_gain, Some(4.5));
        assert_eq!(bucket.worst_loss, Some(-1.0));
    }

    #[test]
    fn stopped_out_is_never_a_win() {
        let mut bucket = AnalyticsBucket::default();
        bucket.record(5.0, true);
        bucket.record(2.0, false);
        bucket.record(-1.0, false);
        assert_eq!(bucket.total_alerts, 3);
        assert_eq!(bucket.wins, 1);
        assert_eq!(bucket.losses, 1);
        assert_eq!(bucket.stopped_out, 1);
        assert_eq!(
            bucket.total_alerts,
            bucket.wins + bucket.losses + bucket.stopped_out
        );
    }

    #[test]
    fn zero_performance_counts_as_loss() {
        let mut bucket = AnalyticsBucket::default();
        bucket.record(0.0, false);
        assert_eq!(bucket.losses, 1);
        assert_eq!(bucket.success_rate(), 0.0);
    }
}
