//! # routes::check
//!
//! Diagnostic endpoints: single-symbol enrichment preview, manual digest
//! trigger, and sink smoke tests.  None of these record into the Store,
//! Tracker or Analytics — they exist to inspect the pipeline, not feed it.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    clock,
    engine::enricher::{enrich, EnrichOutcome},
    engine::formatter,
    error::AppError,
    scheduler,
    state::SharedState,
};

// ─── GET /health ──────────────────────────────────────────────────────────────

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// ─── GET /check/{symbol} ──────────────────────────────────────────────────────

/// Run the Enricher for one symbol and report the record plus the open=low
/// admission booleans, without any filtering applied.
pub async fn check_symbol(
    State(state): State<SharedState>,
    Path(symbol): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let symbol = symbol.trim().to_string();
    if symbol.is_empty() {
        return Err(AppError::BadRequest("symbol must be non-empty".to_string()));
    }

    match enrich(&state.cache, &symbol, None).await {
        EnrichOutcome::Enriched(alert) => {
            let open_equals_low = (alert.open - alert.low).abs() <= 0.01;
            let above_sma = alert.sma20.map(|sma| alert.close > sma).unwrap_or(true);
            let profile = state.cache.summary(&symbol).await;
            Ok(Json(json!({
                "ok": true,
                "alert": *alert,
                "profile": profile,
                "openEqualsLow": open_equals_low,
                "aboveSMA": above_sma,
            })))
        }
        // No scan name was passed, so filters cannot fire; anything else
        // means the vendor had nothing.
        _ => Err(AppError::EnrichUnavailable(symbol)),
    }
}

// ─── GET /daily-summary ───────────────────────────────────────────────────────

/// Manually run the end-of-day sequence: digest → store → send → rollover.
pub async fn trigger_daily_summary(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let summary = scheduler::run_daily_digest(&state)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(json!({ "ok": true, "summary": summary })))
}

// ─── GET /test-telegram ───────────────────────────────────────────────────────

pub async fn test_telegram(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, AppError> {
    let message = format!(
        "✅ Test message from the stock alert gateway ({})",
        clock::market_now().format("%d %b %Y, %I:%M %p IST")
    );
    match state.sink.send(&message).await {
        Ok(()) => {
            state.status.record_telegram_result(Ok(()));
            Ok(Json(json!({ "ok": true, "enabled": state.sink.is_enabled() })))
        }
        Err(e) => {
            let description = format!("{e:#}");
            state.status.record_telegram_result(Err(&description));
            Err(AppError::SinkFailure(description))
        }
    }
}

// ─── GET /test-multiple?symbols=A,B&scan=... ──────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TestMultipleParams {
    symbols: String,
    #[serde(default)]
    scan: Option<String>,
}

/// Enrich a comma-separated list and dispatch a batch message, recording
/// nothing.  Useful for checking formatting against live data.
pub async fn test_multiple(
    State(state): State<SharedState>,
    Query(params): Query<TestMultipleParams>,
) -> Result<impl IntoResponse, AppError> {
    let symbols: Vec<String> = params
        .symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.is_empty() {
        return Err(AppError::BadRequest("symbols query must be non-empty".to_string()));
    }

    let mut alerts = Vec::new();
    for symbol in &symbols {
        if let EnrichOutcome::Enriched(alert) =
            enrich(&state.cache, symbol, params.scan.as_deref()).await
        {
            alerts.push(*alert);
        }
    }
    if alerts.is_empty() {
        return Err(AppError::EnrichUnavailable(params.symbols));
    }

    let sent_at = clock::market_now().format("%d %b %Y, %I:%M %p IST").to_string();
    let message = formatter::format_batch(&alerts, params.scan.as_deref(), &sent_at);
    state
        .sink
        .send(&message)
        .await
        .map_err(|e| AppError::SinkFailure(format!("{e:#}")))?;

    let stocks: Vec<&str> = alerts.iter().map(|a| a.symbol.as_str()).collect();
    Ok(Json(json!({ "ok": true, "stocks": stocks })))
}
