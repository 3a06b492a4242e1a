//! # routes::dashboard
//!
//! Read-only observability surface: JSON snapshots under `/api/*` plus two
//! self-refreshing HTML shells that poll them.

use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use chrono::NaiveDate;

use crate::{analytics::Period, clock, state::SharedState};

// ─── GET /api/status ──────────────────────────────────────────────────────────

pub async fn api_status(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.status.snapshot();
    let tracked = state.tracker.len().await;
    Json(json!({
        "ok": true,
        "status": snapshot,
        "tracking": {
            "symbols_today": tracked,
            "remote_store": state.store.remote_configured(),
            "sink_enabled": state.sink.is_enabled(),
        },
    }))
}

// ─── GET /api/analytics?period=day|week|month|all ─────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    #[serde(default)]
    period: Option<String>,
}

pub async fn api_analytics(
    State(state): State<SharedState>,
    Query(params): Query<AnalyticsParams>,
) -> impl IntoResponse {
    let period = Period::parse(params.period.as_deref().unwrap_or("all"));
    let report = state.analytics.report(period).await;
    Json(json!({ "ok": true, "analytics": report }))
}

// ─── GET /api/alerts?date=YYYY-MM-DD ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AlertsParams {
    #[serde(default)]
    date: Option<NaiveDate>,
}

const RECENT_ALERTS_PAGE: usize = 50;

/// Persisted alerts: for one trading day when `date` is given, otherwise the
/// most recent page.
pub async fn api_alerts(
    State(state): State<SharedState>,
    Query(params): Query<AlertsParams>,
) -> impl IntoResponse {
    let alerts = match params.date {
        Some(date) => state.store.alerts_by_date(date).await,
        None => state.store.recent_alerts(RECENT_ALERTS_PAGE).await,
    };
    Json(json!({ "ok": true, "count": alerts.len(), "alerts": alerts }))
}

// ─── GET /api/summaries?days=N ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SummariesParams {
    #[serde(default)]
    days: Option<i64>,
}

/// Daily digests for the last `days` trading days (default 7).
pub async fn api_summaries(
    State(state): State<SharedState>,
    Query(params): Query<SummariesParams>,
) -> impl IntoResponse {
    let to = clock::trading_day();
    let days = params.days.unwrap_or(7).clamp(1, 100);
    let from = to - chrono::Duration::days(days - 1);
    let summaries = state.store.summaries_between(from, to).await;
    Json(json!({ "ok": true, "summaries": summaries }))
}

// ─── HTML shells ──────────────────────────────────────────────────────────────

pub async fn status_page() -> impl IntoResponse {
    Html(page(
        "Gateway Status",
        "/api/status",
        r#"
      const s = data.status;
      out.innerHTML = `
        <h1>📡 Gateway Status</h1>
        <div class="grid">
          <div class="card"><b>Uptime</b><br>${Math.floor(s.uptime_secs / 60)} min</div>
          <div class="card"><b>Webhooks today</b><br>${s.counters.webhooks_today}</div>
          <div class="card"><b>Alerts sent</b><br>${s.counters.alerts_sent}</div>
          <div class="card"><b>Tracked symbols</b><br>${data.tracking.symbols_today}</div>
          <div class="card"><b>Telegram</b><br>${s.telegram.connected ? "🟢 connected" : "🔴 down"}</div>
          <div class="card"><b>Fetch errors</b><br>${s.counters.data_fetch_errors}</div>
        </div>
        <h2>Recent alerts</h2>
        <ul>${s.recent_alerts.map(a => `<li>${a.symbol} — ${a.scan_name ?? ""} (${a.at})</li>`).join("")}</ul>
        <h2>Recent errors</h2>
        <ul>${s.recent_errors.map(e => `<li>[${e.context}] ${e.message}</li>`).join("")}</ul>`;
"#,
    ))
}

pub async fn analytics_page() -> impl IntoResponse {
    Html(page(
        "Performance Analytics",
        "/api/analytics?period=all",
        r#"
      const a = data.analytics;
      const rows = Object.entries(a.by_symbol)
        .sort((x, y) => y[1].total_alerts - x[1].total_alerts)
        .map(([sym, b]) =>
          `<tr><td>${sym}</td><td>${b.total_alerts}</td><td>${b.wins}</td>` +
          `<td>${b.losses}</td><td>${b.stopped_out}</td>` +
          `<td>${b.avg_performance.toFixed(2)}%</td></tr>`)
        .join("");
      out.innerHTML = `
        <h1>📈 Performance Analytics (${a.period})</h1>
        <div class="grid">
          <div class="card"><b>Total alerts</b><br>${a.totals.total_alerts}</div>
          <div class="card"><b>Success rate</b><br>${a.success_rate.toFixed(1)}%</div>
          <div class="card"><b>Avg move</b><br>${a.totals.avg_performance.toFixed(2)}%</div>
          <div class="card"><b>Stopped out</b><br>${a.totals.stopped_out}</div>
        </div>
        <h2>By symbol</h2>
        <table><tr><th>Symbol</th><th>Alerts</th><th>Wins</th><th>Losses</th><th>Stopped</th><th>Avg %</th></tr>${rows}</table>`;
"#,
    ))
}

/// Shared page chrome: dark theme, 30 s polling of `endpoint`, with `render`
/// receiving the parsed body as `data` and writing into `out`.
fn page(title: &str, endpoint: &str, render: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
  body {{ font-family: system-ui, sans-serif; background: #0f1420; color: #e6e8ee; margin: 2rem; }}
  .grid {{ display: grid; grid-template-columns: repeat(auto-fill, minmax(170px, 1fr)); gap: 0.8rem; }}
  .card {{ background: #1a2232; border-radius: 8px; padding: 0.9rem; }}
  table {{ border-collapse: collapse; margin-top: 0.5rem; }}
  th, td {{ padding: 0.3rem 0.8rem; border-bottom: 1px solid #2a3550; text-align: left; }}
  h1 {{ margin-top: 0; }}
</style>
</head>
<body>
<div id="out">Loading…</div>
<script>
  const out = document.getElementById("out");
  async function refresh() {{
    try {{
      const data = await (await fetch("{endpoint}")).json();
      {render}
    }} catch (e) {{
      out.textContent = "Failed to load: " + e;
    }}
  }}
  refresh();
  setInterval(refresh, 30000);
</script>
</body>
</html>"#
    )
}
