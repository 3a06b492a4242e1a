//! # tracker — intraday performance of every alerted symbol
//!
//! One map {symbol → [`TrackerEntry`]} for the current trading day, guarded
//! by a single mutex.  Every `track` writes a live snapshot to
//! `alerted_stocks.json`; `rollover` archives the day to
//! `alerted_stocks_<date>.json` and clears the map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::clock;
use crate::market::QuoteCache;
use crate::models::summary::PerformerLine;
use crate::models::{DailySummary, EnrichedAlert, ScanCount, TrackerEntry};

/// Max concurrent quote fetches during a refresh sweep.
const REFRESH_BATCH: usize = 5;
/// Pause between refresh batches, easing pressure on the rate limiter.
const INTER_BATCH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Default, Serialize, Deserialize)]
struct TrackerState {
    day: Option<NaiveDate>,
    entries: HashMap<String, TrackerEntry>,
}

pub struct Tracker {
    data_dir: PathBuf,
    inner: Mutex<TrackerState>,
}

impl Tracker {
    /// Load the live snapshot if it belongs to today's trading day,
    /// otherwise start empty.
    pub async fn init(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;

        let snapshot_path = data_dir.join("alerted_stocks.json");
        let state = match tokio::fs::read_to_string(&snapshot_path).await {
            Ok(raw) => {
                let loaded: TrackerState = serde_json::from_str(&raw).unwrap_or_default();
                if loaded.day == Some(clock::trading_day()) {
                    info!(entries = loaded.entries.len(), "restored tracker snapshot");
                    loaded
                } else {
                    TrackerState::default()
                }
            }
            Err(_) => TrackerState::default(),
        };

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            inner: Mutex::new(state),
        })
    }

    /// Upsert an entry for the alert's symbol.  `alert_time` and
    /// `alert_price` are set on first insert only; content is
    /// last-write-wins for repeat alerts on the same day.
    pub async fn track(&self, alert: &EnrichedAlert) {
        let mut state = self.inner.lock().await;

        let today = clock::trading_day();
        if state.day != Some(today) {
            state.entries.clear();
            state.day = Some(today);
        }

        match state.entries.get_mut(&alert.symbol) {
            Some(entry) => entry.absorb(alert),
            None => {
                state
                    .entries
                    .insert(alert.symbol.clone(), TrackerEntry::from_alert(alert));
            }
        }

        self.write_snapshot(&state).await;
    }

    /// Re-price every tracked symbol: batched quote fetches (at most
    /// [`REFRESH_BATCH`] concurrent) with a pause between batches.
    pub async fn refresh(&self, cache: &QuoteCache) {
        let symbols: Vec<String> = {
            let state = self.inner.lock().await;
            state.entries.keys().cloned().collect()
        };
        if symbols.is_empty() {
            return;
        }

        let mut prices: HashMap<String, f64> = HashMap::new();
        let mut batches = symbols.chunks(REFRESH_BATCH).peekable();
        while let Some(batch) = batches.next() {
            let fetches = batch.iter().map(|symbol| async {
                let quote = cache.quote(symbol).await;
                (symbol.clone(), quote)
            });
            for (symbol, quote) in join_all(fetches).await {
                match quote {
                    Some(q) => {
                        prices.insert(symbol, q.close);
                    }
                    None => warn!(symbol = %symbol, "refresh: no quote — keeping last price"),
                }
            }
            if batches.peek().is_some() {
                tokio::time::sleep(INTER_BATCH_DELAY).await;
            }
        }

        let mut state = self.inner.lock().await;
        for (symbol, price) in prices {
            if let Some(entry) = state.entries.get_mut(&symbol) {
                entry.update_price(price);
            }
        }
        self.write_snapshot(&state).await;
    }

    /// Refresh, then build the end-of-day digest.
    pub async fn digest(&self, cache: &QuoteCache) -> DailySummary {
        self.refresh(cache).await;
        let state = self.inner.lock().await;
        let day = state.day.unwrap_or_else(clock::trading_day);
        let entries: Vec<TrackerEntry> = state.entries.values().cloned().collect();
        build_summary(day, &entries)
    }

    /// Archive today's entries to `alerted_stocks_<date>.json` and clear the
    /// live map.  Called after the digest has been published.
    pub async fn rollover(&self) -> anyhow::Result<()> {
        let mut state = self.inner.lock().await;
        let day = state.day.unwrap_or_else(clock::trading_day);

        if !state.entries.is_empty() {
            let archive = self.data_dir.join(format!("alerted_stocks_{day}.json"));
            let raw = serde_json::to_string_pretty(&state.entries)?;
            tokio::fs::write(&archive, raw)
                .await
                .with_context(|| format!("writing {}", archive.display()))?;
            info!(entries = state.entries.len(), %day, "tracker archived");
        }

        state.entries.clear();
        state.day = None;
        self.write_snapshot(&state).await;
        Ok(())
    }

    /// Read-only copy of the live entries, for dashboards.
    pub async fn entries(&self) -> Vec<TrackerEntry> {
        let state = self.inner.lock().await;
        state.entries.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    async fn write_snapshot(&self, state: &TrackerState) {
        let path = self.data_dir.join("alerted_stocks.json");
        match serde_json::to_string_pretty(state) {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&path, raw).await {
                    warn!(error = %e, "tracker snapshot write failed");
                }
            }
            Err(e) => warn!(error = %e, "tracker snapshot serialize failed"),
        }
    }
}

// ─── Digest Construction ──────────────────────────────────────────────────────

/// Partition the day's entries and render the digest message.
///
/// Winners are entries up since their alert that have not hit the stop;
/// everything else counts as a loser.  A stopped-out entry is tallied in
/// `stopped_out` as well, so `winners + losers == total` always holds.
pub fn build_summary(day: NaiveDate, entries: &[TrackerEntry]) -> DailySummary {
    let total = entries.len();
    let stopped_out = entries.iter().filter(|e| e.hit_stop_loss).count();
    let winners = entries
        .iter()
        .filter(|e| e.percent_change > 0.0 && !e.hit_stop_loss)
        .count();
    let losers = total - winners;
    let win_rate = if total == 0 {
        0.0
    } else {
        winners as f64 / total as f64 * 100.0
    };

    let mut ranked: Vec<&TrackerEntry> = entries.iter().collect();
    ranked.sort_by(|a, b| {
        b.percent_change
            .partial_cmp(&a.percent_change)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let line = |e: &TrackerEntry| PerformerLine {
        symbol: e.symbol.clone(),
        percent_change: e.percent_change,
        hit_stop_loss: e.hit_stop_loss,
    };
    let top_performers: Vec<PerformerLine> = ranked.iter().take(3).map(|e| line(e)).collect();
    let worst_performers: Vec<PerformerLine> =
        ranked.iter().rev().take(3).map(|e| line(e)).collect();

    let best_performer = ranked.first().map(|e| e.symbol.clone());
    let worst_performer = ranked.last().map(|e| e.symbol.clone());

    let mut by_scan: HashMap<String, usize> = HashMap::new();
    for entry in entries {
        let name = entry
            .scan_name
            .clone()
            .unwrap_or_else(|| "(unnamed)".to_string());
        *by_scan.entry(name).or_insert(0) += 1;
    }
    let mut scan_breakdown: Vec<ScanCount> = by_scan
        .into_iter()
        .map(|(scan_name, count)| ScanCount { scan_name, count })
        .collect();
    scan_breakdown.sort_by(|a, b| b.count.cmp(&a.count).then(a.scan_name.cmp(&b.scan_name)));

    let mut summary = DailySummary {
        date: day,
        total_alerts: total,
        winners,
        losers,
        stopped_out,
        win_rate,
        best_performer,
        worst_performer,
        top_performers,
        worst_performers,
        scan_breakdown,
        message_text: String::new(),
    };
    summary.message_text = render_digest(&summary);
    summary
}

fn render_digest(s: &DailySummary) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("📊 *Daily Performance Digest — {}*", s.date));
    lines.push(String::new());

    if s.total_alerts == 0 {
        lines.push("No alerts were tracked today.".to_string());
        return lines.join("\n");
    }

    lines.push(format!("Total alerts: {}", s.total_alerts));
    lines.push(format!(
        "✅ Winners: {} | ❌ Losers: {} | 🛑 Stopped out: {}",
        s.winners, s.losers, s.stopped_out
    ));
    lines.push(format!("🎯 Win rate: {:.1}%", s.win_rate));

    if !s.top_performers.is_empty() {
        lines.push(String::new());
        lines.push("🏆 Top performers:".to_string());
        for (i, p) in s.top_performers.iter().enumerate() {
            lines.push(format!(
                "{}. {} {}",
                i + 1,
                p.symbol,
                crate::engine::formatter::fmt_pct(p.percent_change)
            ));
        }
    }
    if !s.worst_performers.is_empty() {
        lines.push(String::new());
        lines.push("📉 Worst performers:".to_string());
        for (i, p) in s.worst_performers.iter().enumerate() {
            let stop = if p.hit_stop_loss { " (stopped out)" } else { "" };
            lines.push(format!(
                "{}. {} {}{stop}",
                i + 1,
                p.symbol,
                crate::engine::formatter::fmt_pct(p.percent_change)
            ));
        }
    }
    if !s.scan_breakdown.is_empty() {
        lines.push(String::new());
        lines.push("📋 Scan breakdown:".to_string());
        for scan in &s.scan_breakdown {
            lines.push(format!("- {}: {}", scan.scan_name, scan.count));
        }
    }

    lines.join("\n")
}
