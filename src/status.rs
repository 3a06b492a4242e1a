//! # status — in-memory health counters and recent-activity ring buffers
//!
//! Everything the `/api/status` read model serves: webhook/alert counters,
//! the last 20 alerts, the last 50 errors, and sink health.  One lock, short
//! critical sections.  Checkpoints to `system_status.json` every 5 minutes
//! and on every recorded error; daily counters reset when the trading-day
//! key changes.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::clock;

const RECENT_ALERTS_CAP: usize = 20;
const RECENT_ERRORS_CAP: usize = 50;
pub const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentAlert {
    pub symbol: String,
    pub scan_name: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentError {
    pub context: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StatusInner {
    day: Option<NaiveDate>,
    alerts_sent: u64,
    webhooks_today: u64,
    webhooks_total: u64,
    telegram_errors: u64,
    data_fetch_errors: u64,
    recent_alerts: VecDeque<RecentAlert>,
    recent_errors: VecDeque<RecentError>,
    telegram_connected: bool,
    telegram_last_sent: Option<DateTime<Utc>>,
    telegram_last_error: Option<String>,
    response_time_ms_sum: f64,
    response_time_count: u64,
}

/// The JSON shape served by `/api/status`.
#[derive(Debug, Serialize)]
pub struct StatusSnapshot {
    pub start_time: DateTime<Utc>,
    pub uptime_secs: i64,
    pub counters: CounterSnapshot,
    pub recent_alerts: Vec<RecentAlert>,
    pub recent_errors: Vec<RecentError>,
    pub telegram: TelegramSnapshot,
    pub performance: PerformanceSnapshot,
}

#[derive(Debug, Serialize)]
pub struct CounterSnapshot {
    pub alerts_sent: u64,
    pub webhooks_today: u64,
    pub webhooks_total: u64,
    pub telegram_errors: u64,
    pub data_fetch_errors: u64,
}

#[derive(Debug, Serialize)]
pub struct TelegramSnapshot {
    pub connected: bool,
    pub last_sent: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PerformanceSnapshot {
    pub memory_bytes: Option<u64>,
    pub cpu_load_1m: Option<f64>,
    pub avg_response_ms: Option<f64>,
}

pub struct StatusMonitor {
    path: PathBuf,
    started_at: DateTime<Utc>,
    inner: Mutex<StatusInner>,
}

impl StatusMonitor {
    pub async fn init(data_dir: &Path) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(data_dir)
            .await
            .with_context(|| format!("creating {}", data_dir.display()))?;
        let path = data_dir.join("system_status.json");

        // Carry lifetime totals across restarts; everything else is live.
        let mut inner = StatusInner::default();
        if let Ok(raw) = tokio::fs::read_to_string(&path).await {
            if let Ok(previous) = serde_json::from_str::<StatusInner>(&raw) {
                inner.webhooks_total = previous.webhooks_total;
                inner.alerts_sent = previous.alerts_sent;
            }
        }
        inner.day = Some(clock::trading_day());

        Ok(Self {
            path,
            started_at: Utc::now(),
            inner: Mutex::new(inner),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusInner> {
        self.inner.lock().expect("status lock poisoned")
    }

    /// Reset per-day counters when the trading-day key has moved on.
    /// Invoked from the checkpoint tick and on every webhook.
    pub fn roll_day_if_needed(&self) {
        let today = clock::trading_day();
        let mut inner = self.lock();
        if inner.day != Some(today) {
            inner.day = Some(today);
            inner.webhooks_today = 0;
        }
    }

    pub fn record_webhook(&self) {
        self.roll_day_if_needed();
        let mut inner = self.lock();
        inner.webhooks_today += 1;
        inner.webhooks_total += 1;
    }

    pub fn record_alert(&self, symbol: &str, scan_name: Option<&str>) {
        let mut inner = self.lock();
        inner.alerts_sent += 1;
        push_capped(
            &mut inner.recent_alerts,
            RecentAlert {
                symbol: symbol.to_string(),
                scan_name: scan_name.map(str::to_string),
                at: Utc::now(),
            },
            RECENT_ALERTS_CAP,
        );
    }

    pub fn record_data_fetch_error(&self, description: &str) {
        {
            let mut inner = self.lock();
            inner.data_fetch_errors += 1;
            push_capped(
                &mut inner.recent_errors,
                RecentError {
                    context: "data_fetch".to_string(),
                    message: description.to_string(),
                    at: Utc::now(),
                },
                RECENT_ERRORS_CAP,
            );
        }
        self.persist_now();
    }

    pub fn record_error(&self, context: &str, message: &str) {
        {
            let mut inner = self.lock();
            push_capped(
                &mut inner.recent_errors,
                RecentError {
                    context: context.to_string(),
                    message: message.to_string(),
                    at: Utc::now(),
                },
                RECENT_ERRORS_CAP,
            );
        }
        self.persist_now();
    }

    pub fn record_telegram_result(&self, result: Result<(), &str>) {
        let failed = result.is_err();
        {
            let mut inner = self.lock();
            match result {
                Ok(()) => {
                    inner.telegram_connected = true;
                    inner.telegram_last_sent = Some(Utc::now());
                }
                Err(message) => {
                    inner.telegram_connected = false;
                    inner.telegram_errors += 1;
                    inner.telegram_last_error = Some(message.to_string());
                    push_capped(
                        &mut inner.recent_errors,
                        RecentError {
                            context: "telegram".to_string(),
                            message: message.to_string(),
                            at: Utc::now(),
                        },
                        RECENT_ERRORS_CAP,
                    );
                }
            }
        }
        if failed {
            self.persist_now();
        }
    }

    pub fn record_response_time(&self, elapsed: Duration) {
        let mut inner = self.lock();
        inner.response_time_ms_sum += elapsed.as_secs_f64() * 1000.0;
        inner.response_time_count += 1;
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let inner = self.lock();
        let avg_response_ms = (inner.response_time_count > 0)
            .then(|| inner.response_time_ms_sum / inner.response_time_count as f64);

        StatusSnapshot {
            start_time: self.started_at,
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            counters: CounterSnapshot {
                alerts_sent: inner.alerts_sent,
                webhooks_today: inner.webhooks_today,
                webhooks_total: inner.webhooks_total,
                telegram_errors: inner.telegram_errors,
                data_fetch_errors: inner.data_fetch_errors,
            },
            recent_alerts: inner.recent_alerts.iter().cloned().collect(),
            recent_errors: inner.recent_errors.iter().cloned().collect(),
            telegram: TelegramSnapshot {
                connected: inner.telegram_connected,
                last_sent: inner.telegram_last_sent,
                last_error: inner.telegram_last_error.clone(),
            },
            performance: PerformanceSnapshot {
                memory_bytes: process_rss_bytes(),
                cpu_load_1m: load_average_1m(),
                avg_response_ms,
            },
        }
    }

    /// Persist the raw counters; best-effort.
    pub async fn checkpoint(&self) {
        let raw = {
            let inner = self.lock();
            serde_json::to_string_pretty(&*inner)
        };
        match raw {
            Ok(raw) => {
                if let Err(e) = tokio::fs::write(&self.path, raw).await {
                    warn!(error = %e, "status checkpoint failed");
                }
            }
            Err(e) => warn!(error = %e, "status serialize failed"),
        }
    }

    /// Synchronous checkpoint used on every error path, so the on-disk
    /// state reflects the error even if the process dies before the next
    /// periodic tick.  The file is small; the write stays off the lock.
    fn persist_now(&self) {
        let raw = {
            let inner = self.lock();
            serde_json::to_string_pretty(&*inner)
        };
        match raw {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.path, raw) {
                    warn!(error = %e, "status checkpoint failed");
                }
            }
            Err(e) => warn!(error = %e, "status serialize failed"),
        }
    }
}

fn push_capped<T>(buffer: &mut VecDeque<T>, item: T, cap: usize) {
    if buffer.len() >= cap {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

/// Resident set size from procfs; `None` off Linux.
fn process_rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
    Some(kb * 1024)
}

fn load_average_1m() -> Option<f64> {
    let raw = std::fs::read_to_string("/proc/loadavg").ok()?;
    raw.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("stockalert-status-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn ring_buffers_never_exceed_their_caps() {
        let monitor = StatusMonitor::init(&tmp_dir()).await.unwrap();

        for i in 0..100 {
            monitor.record_alert(&format!("S{i}"), None);
            monitor.record_error("test", &format!("e{i}"));
            monitor.record_data_fetch_error(&format!("d{i}"));
        }

        let snapshot = monitor.snapshot();
        assert_eq!(snapshot.recent_alerts.len(), RECENT_ALERTS_CAP);
        assert_eq!(snapshot.recent_errors.len(), RECENT_ERRORS_CAP);
        // Oldest evicted first: the newest alert must still be present.
        assert_eq!(snapshot.recent_alerts.last().unwrap().symbol, "S99");
        assert_eq!(snapshot.counters.data_fetch_errors, 100);
    }

    #[tokio::test]
    async fn telegram_failure_flips_connected_and_counts() {
        let monitor = StatusMonitor::init(&tmp_dir()).await.unwrap();
        monitor.record_telegram_result(Ok(()));
        assert!(monitor.snapshot().telegram.connected);

        monitor.record_telegram_result(Err("403 Forbidden"));
        let snapshot = monitor.snapshot();
        assert!(!snapshot.telegram.connected);
        assert_eq!(snapshot.counters.telegram_errors, 1);
        assert_eq!(snapshot.telegram.last_error.as_deref(), Some("403 Forbidden"));
    }

    #[tokio::test]
    async fn every_recorded_error_is_checkpointed_immediately() {
        let dir = tmp_dir();
        let monitor = StatusMonitor::init(&dir).await.unwrap();

        monitor.record_error("webhook", "boom");
        let on_disk: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join("system_status.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk["recent_errors"][0]["message"], "boom");

        monitor.record_data_fetch_error("vendor down");
        monitor.record_telegram_result(Err("403 Forbidden"));
        let on_disk: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.join("system_status.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(on_disk["recent_errors"].as_array().unwrap().len(), 3);
        assert_eq!(on_disk["telegram_errors"], 1);
        assert_eq!(on_disk["data_fetch_errors"], 1);
    }

    #[tokio::test]
    async fn totals_survive_a_checkpoint_reload() {
        let dir = tmp_dir();
        let monitor = StatusMonitor::init(&dir).await.unwrap();
        monitor.record_webhook();
        monitor.record_webhook();
        monitor.checkpoint().await;

        let reloaded = StatusMonitor::init(&dir).await.unwrap();
        let snapshot = reloaded.snapshot();
        assert_eq!(snapshot.counters.webhooks_total, 2);
        assert_eq!(snapshot.counters.webhooks_today, 0, "today resets on restart");
    }
}
