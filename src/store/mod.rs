//! # store — durable persistence of alerts and digests
//!
//! Remote-first with a capped local journal as the fallback stream:
//!
//! * writes go to the remote document store when one is configured and
//!   reachable; any remote failure lands the record in the local journal
//!   instead — a request never fails over storage;
//! * the journal is an independent stream, never replayed into the remote
//!   store on recovery;
//! * reads prefer remote and fall back to the journal for recency.

pub mod journal;
pub mod remote;

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::warn;

use crate::models::{DailySummary, PersistedAlert};
use journal::LocalJournal;
pub use remote::{MongoStore, RemoteStore};

pub struct Store {
    remote: Option<Arc<dyn RemoteStore>>,
    journal: LocalJournal,
}

impl Store {
    /// Open the journal under `data_dir` and attach the optional remote.
    pub async fn open(
        data_dir: &Path,
        remote: Option<Arc<dyn RemoteStore>>,
    ) -> anyhow::Result<Self> {
        let journal = LocalJournal::open(data_dir.join("mongodb_backup.json")).await?;
        Ok(Self { remote, journal })
    }

    /// Append-only persist.  Never fails the caller: a remote error demotes
    /// the write to the journal, and a journal error is logged and dropped.
    pub async fn append_alert(&self, alert: PersistedAlert) {
        if let Some(remote) = &self.remote {
            match remote.append_alert(&alert).await {
                Ok(()) => return,
                Err(e) => warn!(error = %format!("{e:#}"), "remote append failed — journaling"),
            }
        }
        if let Err(e) = self.journal.append_alert(&alert).await {
            warn!(error = %format!("{e:#}"), "journal append failed — alert dropped");
        }
    }

    /// One summary per trading day; same-date regeneration replaces.
    pub async fn upsert_summary(&self, summary: &DailySummary) {
        if let Some(remote) = &self.remote {
            match remote.upsert_summary(summary).await {
                Ok(()) => return,
                Err(e) => warn!(error = %format!("{e:#}"), "remote upsert failed — journaling"),
            }
        }
        if let Err(e) = self.journal.upsert_summary(summary).await {
            warn!(error = %format!("{e:#}"), "journal upsert failed — summary dropped");
        }
    }

    pub async fn recent_alerts(&self, n: usize) -> Vec<PersistedAlert> {
        if let Some(remote) = &self.remote {
            match remote.recent_alerts(n as i64).await {
                Ok(alerts) => return alerts,
                Err(e) => warn!(error = %format!("{e:#}"), "remote read failed — using journal"),
            }
        }
        self.journal.recent_alerts(n).await
    }

    pub async fn alerts_by_date(&self, date: NaiveDate) -> Vec<PersistedAlert> {
        if let Some(remote) = &self.remote {
            match remote.alerts_by_date(date).await {
                Ok(alerts) => return alerts,
                Err(e) => warn!(error = %format!("{e:#}"), "remote read failed — using journal"),
            }
        }
        self.journal.alerts_by_date(date).await
    }

    pub async fn summaries_between(&self, from: NaiveDate, to: NaiveDate) -> Vec<DailySummary> {
        if let Some(remote) = &self.remote {
            match remote.summaries_between(from, to).await {
                Ok(summaries) => return summaries,
                Err(e) => warn!(error = %format!("{e:#}"), "remote read failed — using journal"),
            }
        }
        self.journal.summaries_between(from, to).await
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }
}
