//! # market::vendor
//!
//! The [`MarketVendor`] port and its production implementation,
//! [`YahooChartClient`], which speaks the Yahoo Finance v8 chart API over
//! the shared `reqwest::Client`.
//!
//! The trait exists so the webhook pipeline can be exercised end-to-end
//! against an in-memory vendor double; nothing above this module knows which
//! implementation it is talking to.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::models::{Bar, Quote, Summary};

/// Vendor calls time out after this long; a timeout is a transient failure,
/// not an error that propagates.
pub const VENDOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Market-data port: real-time quote, descriptive summary, historical bars.
///
/// Implementations return `Ok(None)` / `Ok(vec![])` for unknown symbols and
/// reserve `Err` for transport-level failures (timeout, 5xx, parse).
#[async_trait]
pub trait MarketVendor: Send + Sync {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>>;
    async fn summary(&self, symbol: &str) -> anyhow::Result<Option<Summary>>;
    async fn history(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> anyhow::Result<Vec<Bar>>;
}

// ─── Test Symbols ─────────────────────────────────────────────────────────────

/// Deterministic fixture symbols that bypass the vendor entirely.
pub const SIMULATED_TEST: &str = "SIMULATED.TEST";
pub const REAL_TEST: &str = "REAL.TEST";

pub fn is_test_symbol(symbol: &str) -> bool {
    symbol == SIMULATED_TEST || symbol == REAL_TEST
}

/// Fixture quote for the test symbols.  Values are fixed so diagnostic
/// endpoints produce the same output on every call.
pub fn fixture_quote(symbol: &str) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        open: 100.0,
        high: 104.5,
        low: 99.0,
        close: 102.5,
        previous_close: Some(99.5),
        volume: 1_250_000.0,
        avg_volume_10d: Some(1_000_000.0),
        exchange: Some("TEST".to_string()),
        currency: Some("INR".to_string()),
        timestamp: Utc::now(),
    }
}

/// Fixture history: a gently rising series long enough for every indicator.
pub fn fixture_history(symbol: &str) -> Vec<Bar> {
    let today = crate::clock::trading_day();
    (0..220)
        .rev()
        .map(|age| {
            let close = 80.0 + (220 - age) as f64 * 0.1;
            Bar {
                date: today - chrono::Duration::days(age),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                adj_close: Some(close),
                volume: 1_000_000.0 + symbol.len() as f64,
            }
        })
        .collect()
}

// ─── Symbol Normalization ─────────────────────────────────────────────────────

/// Append the default exchange suffix to bare symbols.  Symbols already
/// carrying a dot suffix (including the `.TEST` fixtures) pass through.
pub fn normalize_symbol(raw: &str, default_suffix: &str) -> String {
    let trimmed = raw.trim().to_uppercase();
    if trimmed.contains('.') {
        trimmed
    } else {
        format!("{trimmed}{default_suffix}")
    }
}

// ─── Yahoo Chart Client ───────────────────────────────────────────────────────

/// Production vendor speaking the v8 chart API.  One instance per process,
/// sharing the process-wide `reqwest::Client`.
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, "https://query1.finance.yahoo.com".to_string())
    }

    /// Used by tests to point the client at a local stub server.
    pub fn with_base_url(http: reqwest::Client, base_url: String) -> Self {
        Self { http, base_url }
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> anyhow::Result<Option<ChartResult>> {
        let url = format!(
            "{}/v8/finance/chart/{symbol}?interval={interval}&range={range}&includePrePost=false",
            self.base_url
        );

        let response = self
            .http
            .get(&url)
            .timeout(VENDOR_TIMEOUT)
            .send()
            .await
            .context("vendor unreachable")?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let envelope: ChartEnvelope = response
            .error_for_status()
            .context("vendor returned error status")?
            .json()
            .await
            .context("vendor response not parseable")?;

        Ok(envelope.chart.result.into_iter().flatten().next())
    }
}

#[async_trait]
impl MarketVendor for YahooChartClient {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        let Some(chart) = self.fetch_chart(symbol, "1d", "1d").await? else {
            return Ok(None);
        };
        Ok(chart.into_quote(symbol))
    }

    async fn summary(&self, symbol: &str) -> anyhow::Result<Option<Summary>> {
        let Some(chart) = self.fetch_chart(symbol, "1d", "1y").await? else {
            return Ok(None);
        };
        let meta = chart.meta;
        Ok(Some(Summary {
            symbol: symbol.to_string(),
            long_name: meta.long_name,
            exchange: meta.exchange_name,
            currency: meta.currency,
            fifty_two_week_high: meta.fifty_two_week_high,
            fifty_two_week_low: meta.fifty_two_week_low,
            market_cap: None,
        }))
    }

    async fn history(
        &self,
        symbol: &str,
        interval: &str,
        range: &str,
    ) -> anyhow::Result<Vec<Bar>> {
        let Some(chart) = self.fetch_chart(symbol, interval, range).await? else {
            return Ok(vec![]);
        };
        Ok(chart.into_bars())
    }
}

// ─── Wire Format ──────────────────────────────────────────────────────────────
// The chart API nests everything under chart.result[0]; every numeric series
// can hold nulls, hence Option on each element.

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    exchange_name: Option<String>,
    #[serde(default)]
    long_name: Option<String>,
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
    #[serde(default)]
    fifty_two_week_high: Option<f64>,
    #[serde(default)]
    fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

impl ChartResult {
    fn into_quote(self, symbol: &str) -> Option<Quote> {
        let series = self.indicators.quote.into_iter().next().unwrap_or_default();

        let first = |v: &[Option<f64>]| v.iter().flatten().copied().next();
        let last = |v: &[Option<f64>]| v.iter().flatten().copied().last();

        let close = last(&series.close).or(self.meta.regular_market_price)?;
        let open = first(&series.open).unwrap_or(close);
        let high = series
            .high
            .iter()
            .flatten()
            .copied()
            .fold(f64::MIN, f64::max);
        let low = series
            .low
            .iter()
            .flatten()
            .copied()
            .fold(f64::MAX, f64::min);

        let timestamp = self
            .meta
            .regular_market_time
            .and_then(|t| Utc.timestamp_opt(t, 0).single())
            .unwrap_or_else(Utc::now);

        Some(Quote {
            symbol: symbol.to_string(),
            open,
            high: if high == f64::MIN { close } else { high },
            low: if low == f64::MAX { close } else { low },
            close,
            previous_close: self.meta.chart_previous_close,
            volume: series.volume.iter().flatten().sum(),
            avg_volume_10d: None,
            exchange: self.meta.exchange_name,
            currency: self.meta.currency,
            timestamp,
        })
    }

    fn into_bars(self) -> Vec<Bar> {
        let series = self.indicators.quote.into_iter().next().unwrap_or_default();
        let offset = crate::clock::market_offset();

        self.timestamp
            .iter()
            .enumerate()
            .filter_map(|(i, &ts)| {
                let date = Utc
                    .timestamp_opt(ts, 0)
                    .single()?
                    .with_timezone(&offset)
                    .date_naive();
                let at = |v: &[Option<f64>]| v.get(i).copied().flatten();
                let close = at(&series.close)?;
                Some(Bar {
                    date,
                    open: at(&series.open).unwrap_or(close),
                    high: at(&series.high).unwrap_or(close),
                    low: at(&series.low).unwrap_or(close),
                    close,
                    adj_close: None,
                    volume: at(&series.volume).unwrap_or(0.0),
                })
            })
            .collect()
    }
}
