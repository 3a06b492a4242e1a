//! # store::journal
//!
//! The durable local fallback: one pretty-printed JSON file
//! (`mongodb_backup.json`) holding `{alerts: [], summaries: []}`, capped at
//! the last 1,000 alerts and 100 summaries.  All mutation goes through a
//! single async mutex, so there is exactly one writer at a time.

use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::clock;
use crate::models::{DailySummary, PersistedAlert};

const MAX_ALERTS: usize = 1_000;
const MAX_SUMMARIES: usize = 100;

#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalData {
    alerts: Vec<PersistedAlert>,
    summaries: Vec<DailySummary>,
}

pub struct LocalJournal {
    path: PathBuf,
    inner: Mutex<JournalData>,
}

impl LocalJournal {
    /// Load the journal from disk, starting empty when the file is absent.
    pub async fn open(path: PathBuf) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => JournalData::default(),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };

        Ok(Self {
            path,
            inner: Mutex::new(data),
        })
    }

    pub async fn append_alert(&self, alert: &PersistedAlert) -> anyhow::Result<()> {
        let mut data = self.inner.lock().await;
        data.alerts.push(alert.clone());
        let overflow = data.alerts.len().saturating_sub(MAX_ALERTS);
        if overflow > 0 {
            data.alerts.drain(..overflow);
        }
        self.flush(&data).await
    }

    pub async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        let mut data = self.inner.lock().await;
        match data.summaries.iter_mut().find(|s| s.date == summary.date) {
            Some(existing) => *existing = summary.clone(),
            None => data.summaries.push(summary.clone()),
        }
        let overflow = data.summaries.len().saturating_sub(MAX_SUMMARIES);
        if overflow > 0 {
            data.summaries.drain(..overflow);
        }
        self.flush(&data).await
    }

    /// Most recent `n` alerts, newest last (insertion order preserved).
    pub async fn recent_alerts(&self, n: usize) -> Vec<PersistedAlert> {
        let data = self.inner.lock().await;
        let start = data.alerts.len().saturating_sub(n);
        data.alerts[start..].to_vec()
    }

    pub async fn alerts_by_date(&self, date: NaiveDate) -> Vec<PersistedAlert> {
        let data = self.inner.lock().await;
        data.alerts
            .iter()
            .filter(|a| clock::trading_day_of(a.alert.received_at) == date)
            .cloned()
            .collect()
    }

    pub async fn summaries_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<DailySummary> {
        let data = self.inner.lock().await;
        data.summaries
            .iter()
            .filter(|s| s.date >= from && s.date <= to)
            .cloned()
            .collect()
    }

    async fn flush(&self, data: &JournalData) -> anyhow::Result<()> {
        let raw = serde_json::to_string_pretty(data)?;
        tokio::fs::write(&self.path, raw)
            .await
            .with_context(|| format!("writing {}", self.path.display()))
    }
}
