//! End-to-end pipeline tests: a real HTTP server on a loopback port, driven
//! through `reqwest`, with scripted collaborators behind the vendor / sink /
//! remote-store ports.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use stockalert::{
    config::Config,
    market::MarketVendor,
    models::{Bar, Quote, Summary},
    notify::AlertSink,
    routes,
    state::{build_state_with, Collaborators, SharedState},
};

// ─── Doubles ──────────────────────────────────────────────────────────────────

/// Vendor double keyed by normalized symbol.  Symbols in `failing` return a
/// transport error, everything unknown returns no data.
#[derive(Default)]
struct ScriptedVendor {
    quotes: HashMap<String, Quote>,
    histories: HashMap<String, Vec<Bar>>,
    failing: HashSet<String>,
}

#[async_trait]
impl MarketVendor for ScriptedVendor {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        if self.failing.contains(symbol) {
            anyhow::bail!("vendor stalled");
        }
        Ok(self.quotes.get(symbol).cloned())
    }

    async fn summary(&self, _symbol: &str) -> anyhow::Result<Option<Summary>> {
        Ok(None)
    }

    async fn history(&self, symbol: &str, _interval: &str, _range: &str) -> anyhow::Result<Vec<Bar>> {
        Ok(self.histories.get(symbol).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ─── Harness ──────────────────────────────────────────────────────────────────

fn quote(symbol: &str, open: f64, high: f64, low: f64, close: f64) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        open,
        high,
        low,
        close,
        previous_close: None,
        volume: 1_000_000.0,
        avg_volume_10d: None,
        exchange: Some("NSI".to_string()),
        currency: Some("INR".to_string()),
        timestamp: chrono::Utc::now(),
    }
}

/// A 20-bar series whose every close is `level`, so sma20 == level.
fn flat_history(level: f64) -> Vec<Bar> {
    let today = chrono::Utc::now().date_naive();
    (0..20)
        .rev()
        .map(|age| Bar {
            date: today - chrono::Duration::days(age),
            open: level,
            high: level + 1.0,
            low: level - 1.0,
            close: level,
            adj_close: Some(level),
            volume: 900_000.0,
        })
        .collect()
}

fn test_config(secret: Option<&str>) -> Config {
    Config {
        port: 0,
        telegram: None,
        webhook_secret: secret.map(str::to_string),
        mongodb_uri: None,
        data_dir: PathBuf::from(std::env::temp_dir())
            .join(format!("stockalert-e2e-{}", uuid::Uuid::new_v4())),
        cache_ttl: Duration::from_secs(900),
        vendor_calls_per_min: 100,
        default_exchange_suffix: ".NS".to_string(),
        digest_hour: 15,
        digest_minute: 30,
    }
}

struct TestApp {
    base: String,
    state: SharedState,
    sink: Arc<RecordingSink>,
    http: reqwest::Client,
}

async fn spawn_app(vendor: ScriptedVendor, secret: Option<&str>) -> TestApp {
    let sink = Arc::new(RecordingSink::default());
    let http = reqwest::Client::new();
    let state = build_state_with(
        test_config(secret),
        Collaborators {
            vendor: Arc::new(vendor),
            sink: sink.clone(),
            remote: None,
        },
        http.clone(),
    )
    .await
    .unwrap();

    let app = routes::router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{addr}"),
        state,
        sink,
        http,
    }
}

impl TestApp {
    async fn post_webhook(&self, body: Value) -> (u16, Value) {
        let response = self
            .http
            .post(format!("{}/webhook", self.base))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap_or(Value::Null))
    }
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_equals_low_happy_path() {
    let mut vendor = ScriptedVendor::default();
    vendor
        .quotes
        .insert("RELIANCE.NS".into(), quote("RELIANCE.NS", 2950.0, 3050.0, 2950.0, 3020.45));
    // sma20 well below the low so the stop stays on the day low.
    vendor.histories.insert("RELIANCE.NS".into(), flat_history(2880.0));
    let app = spawn_app(vendor, None).await;

    let (status, body) = app
        .post_webhook(json!({"symbol": "RELIANCE", "scan_name": "Open=Low Breakout"}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["delivered"], true);
    assert_eq!(body["stocks"], json!(["RELIANCE.NS"]));

    let sent = app.sink.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("RELIANCE.NS"));
    assert!(sent[0].contains("+2.39%"), "percent change in message: {}", sent[0]);
    assert!(sent[0].contains("2950.00"), "stop loss on the day low: {}", sent[0]);

    // Recorded into the tracker for the day.
    assert_eq!(app.state.tracker.len().await, 1);
}

#[tokio::test]
async fn open_equals_low_filter_discards_below_sma() {
    let mut vendor = ScriptedVendor::default();
    vendor
        .quotes
        .insert("RELIANCE.NS".into(), quote("RELIANCE.NS", 2950.0, 2960.0, 2950.0, 2900.0));
    vendor.histories.insert("RELIANCE.NS".into(), flat_history(2930.0));
    let app = spawn_app(vendor, None).await;

    let (status, body) = app
        .post_webhook(json!({"symbol": "RELIANCE", "scan_name": "Open=Low Breakout"}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ignored");
    assert!(app.sink.sent().is_empty());
    assert_eq!(app.state.tracker.len().await, 0);
}

#[tokio::test]
async fn batch_message_sorts_by_stop_distance() {
    // stop falls on the day low (no history), so slDistancePct is
    // (close - low)/close: A 3.0%, B 1.2%, C 2.1%.
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("A.NS".into(), quote("A.NS", 99.0, 101.0, 97.0, 100.0));
    vendor.quotes.insert("B.NS".into(), quote("B.NS", 99.0, 101.0, 98.8, 100.0));
    vendor.quotes.insert("C.NS".into(), quote("C.NS", 99.0, 101.0, 97.9, 100.0));
    let app = spawn_app(vendor, None).await;

    let (status, body) = app
        .post_webhook(json!({"symbols": ["A", "B", "C"], "scan_name": "X"}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");

    let sent = app.sink.sent();
    assert_eq!(sent.len(), 1);
    let a = sent[0].find("A.NS").unwrap();
    let b = sent[0].find("B.NS").unwrap();
    let c = sent[0].find("C.NS").unwrap();
    assert!(b < c && c < a, "expected B, C, A order in: {}", sent[0]);
    assert!(sent[0].contains("3 stocks sorted by smallest stop loss %"));
}

#[tokio::test]
async fn simulated_test_symbol_bypasses_all_side_effects() {
    let app = spawn_app(ScriptedVendor::default(), None).await;

    let (status, body) = app.post_webhook(json!({"symbol": "SIMULATED.TEST"})).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["delivered"], false);
    assert!(app.sink.sent().is_empty());
    assert_eq!(app.state.tracker.len().await, 0);
    assert!(app.state.store.recent_alerts(10).await.is_empty());
}

#[tokio::test]
async fn vendor_failure_discards_symbol_and_counts_the_error() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("GOOD.NS".into(), quote("GOOD.NS", 99.0, 101.0, 98.0, 100.0));
    vendor.failing.insert("Z.NS".into());
    let app = spawn_app(vendor, None).await;

    let (status, body) = app
        .post_webhook(json!({"symbols": ["GOOD", "Z"], "scan_name": "X"}))
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["stocks"], json!(["GOOD.NS"]));

    let snapshot = app.state.status.snapshot();
    assert_eq!(snapshot.counters.data_fetch_errors, 1);
}

#[tokio::test]
async fn wrong_secret_is_rejected_before_any_work() {
    let app = spawn_app(ScriptedVendor::default(), Some("s3cret")).await;

    let response = app
        .http
        .post(format!("{}/webhook", app.base))
        .header("x-webhook-secret", "wrong")
        .json(&json!({"symbol": "RELIANCE"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
    assert_eq!(app.state.status.snapshot().counters.webhooks_total, 0);
}

#[tokio::test]
async fn correct_secret_is_accepted() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("TCS.NS".into(), quote("TCS.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, Some("s3cret")).await;

    let response = app
        .http
        .post(format!("{}/webhook", app.base))
        .header("x-webhook-secret", "s3cret")
        .json(&json!({"symbol": "TCS"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn empty_symbol_list_is_a_bad_request() {
    let app = spawn_app(ScriptedVendor::default(), None).await;
    let (status, body) = app.post_webhook(json!({"symbols": [], "scan_name": "X"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["ok"], false);
}

#[tokio::test]
async fn list_payload_shape_is_accepted() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("INFY.NS".into(), quote("INFY.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, None).await;

    let (status, body) = app
        .post_webhook(json!([{"symbol": "INFY", "scan_name": "X"}]))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["stocks"], json!(["INFY.NS"]));
}

#[tokio::test]
async fn repeated_alert_keeps_one_tracker_entry() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("TCS.NS".into(), quote("TCS.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, None).await;

    app.post_webhook(json!({"symbol": "TCS", "scan_name": "X"})).await;
    app.post_webhook(json!({"symbol": "TCS", "scan_name": "Y"})).await;

    assert_eq!(app.state.tracker.len().await, 1);
    assert_eq!(app.sink.sent().len(), 2);
    // Both webhooks persisted independently.
    assert_eq!(app.state.store.recent_alerts(10).await.len(), 2);
}

#[tokio::test]
async fn status_endpoint_reports_counters() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("TCS.NS".into(), quote("TCS.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, None).await;

    app.post_webhook(json!({"symbol": "TCS", "scan_name": "X"})).await;

    let body: Value = app
        .http
        .get(format!("{}/api/status", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["status"]["counters"]["webhooks_total"], 1);
    assert_eq!(body["status"]["counters"]["alerts_sent"], 1);
    assert_eq!(body["tracking"]["symbols_today"], 1);
}

#[tokio::test]
async fn daily_summary_endpoint_publishes_and_rolls_over() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("TCS.NS".into(), quote("TCS.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, None).await;

    app.post_webhook(json!({"symbol": "TCS", "scan_name": "X"})).await;
    assert_eq!(app.state.tracker.len().await, 1);

    let body: Value = app
        .http
        .get(format!("{}/daily-summary", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["ok"], true);
    assert_eq!(body["summary"]["total_alerts"], 1);

    // Digest message went out and the tracker was archived.
    let sent = app.sink.sent();
    assert!(sent.last().unwrap().contains("Daily Performance Digest"));
    assert_eq!(app.state.tracker.len().await, 0);

    // Re-running the digest for the (now empty) day replaces the summary.
    let today = stockalert::clock::trading_day();
    let summaries = app.state.store.summaries_between(today, today).await;
    assert_eq!(summaries.len(), 1);
}

#[tokio::test]
async fn unknown_symbol_is_ignored_not_an_error() {
    let app = spawn_app(ScriptedVendor::default(), None).await;
    let (status, body) = app
        .post_webhook(json!({"symbol": "NOSUCH", "scan_name": "X"}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn alerts_api_pages_recent_and_filters_by_date() {
    let mut vendor = ScriptedVendor::default();
    vendor.quotes.insert("TCS.NS".into(), quote("TCS.NS", 99.0, 101.0, 98.0, 100.0));
    let app = spawn_app(vendor, None).await;

    app.post_webhook(json!({"symbol": "TCS", "scan_name": "X"})).await;

    let recent: Value = app
        .http
        .get(format!("{}/api/alerts", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent["count"], 1);
    assert_eq!(recent["alerts"][0]["symbol"], "TCS.NS");

    let today = stockalert::clock::trading_day();
    let dated: Value = app
        .http
        .get(format!("{}/api/alerts?date={today}", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(dated["count"], 1);

    let empty: Value = app
        .http
        .get(format!("{}/api/alerts?date=2020-01-01", app.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty["count"], 0);
}
