//! # store::remote
//!
//! The [`RemoteStore`] port and its MongoDB implementation.  Alerts live in
//! `alerts` (append-only), digests in `summaries` (one per trading day,
//! replaced on regeneration).  Documents carry a `trading_day` key so date
//! queries never parse timestamps server-side.

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::TryStreamExt;
use mongodb::{
    bson::{doc, from_document, to_document, Document},
    options::{FindOptions, ReplaceOptions},
    Client, Collection,
};
use tracing::info;

use crate::clock;
use crate::models::{DailySummary, PersistedAlert};

/// Remote document-store port.  `Err` means "remote unavailable" and sends
/// the caller to the local journal.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn append_alert(&self, alert: &PersistedAlert) -> anyhow::Result<()>;
    async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()>;
    async fn recent_alerts(&self, n: i64) -> anyhow::Result<Vec<PersistedAlert>>;
    async fn alerts_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<PersistedAlert>>;
    async fn summaries_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<DailySummary>>;
}

pub struct MongoStore {
    alerts: Collection<Document>,
    summaries: Collection<Document>,
}

impl MongoStore {
    pub async fn connect(uri: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database("stock_alerts");
        info!("connected to remote document store");
        Ok(Self {
            alerts: db.collection("alerts"),
            summaries: db.collection("summaries"),
        })
    }
}

#[async_trait]
impl RemoteStore for MongoStore {
    async fn append_alert(&self, alert: &PersistedAlert) -> anyhow::Result<()> {
        let mut document = to_document(alert)?;
        document.insert(
            "trading_day",
            clock::trading_day_of(alert.alert.received_at).to_string(),
        );
        self.alerts.insert_one(document, None).await?;
        Ok(())
    }

    async fn upsert_summary(&self, summary: &DailySummary) -> anyhow::Result<()> {
        let document = to_document(summary)?;
        self.summaries
            .replace_one(
                doc! { "date": summary.date.to_string() },
                document,
                ReplaceOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }

    async fn recent_alerts(&self, n: i64) -> anyhow::Result<Vec<PersistedAlert>> {
        let options = FindOptions::builder()
            .sort(doc! { "received_at": -1 })
            .limit(n)
            .build();
        let documents: Vec<Document> = self
            .alerts
            .find(doc! {}, options)
            .await?
            .try_collect()
            .await?;
        let mut alerts: Vec<PersistedAlert> = documents
            .into_iter()
            .filter_map(|mut d| {
                d.remove("_id");
                d.remove("trading_day");
                from_document(d).ok()
            })
            .collect();
        // Newest-last to match the journal's insertion order.
        alerts.reverse();
        Ok(alerts)
    }

    async fn alerts_by_date(&self, date: NaiveDate) -> anyhow::Result<Vec<PersistedAlert>> {
        let options = FindOptions::builder().sort(doc! { "received_at": 1 }).build();
        let documents: Vec<Document> = self
            .alerts
            .find(doc! { "trading_day": date.to_string() }, options)
            .await?
            .try_collect()
            .await?;
        Ok(documents
            .into_iter()
            .filter_map(|mut d| {
                d.remove("_id");
                d.remove("trading_day");
                from_document(d).ok()
            })
            .collect())
    }

    async fn summaries_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> anyhow::Result<Vec<DailySummary>> {
        let filter = doc! {
            "date": { "$gte": from.to_string(), "$lte": to.to_string() }
        };
        let options = FindOptions::builder().sort(doc! { "date": 1 }).build();
        let documents: Vec<Document> = self
            .summaries
            .find(filter, options)
            .await?
            .try_collect()
            .await?;
        Ok(documents
            .into_iter()
            .filter_map(|mut d| {
                d.remove("_id");
                from_document(d).ok()
            })
            .collect())
    }
}
