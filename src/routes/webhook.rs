//! # routes::webhook
//!
//! `POST /webhook` — the pipeline entry point.  Each request walks:
//!
//! ```text
//! received → authenticated → decoded → enriched → dispatched → recorded → replied
//! ```
//!
//! Per-symbol failures (no data, filtered out) are logged and skipped; the
//! request only fails as a whole on bad auth, an empty payload, a sink that
//! refuses even the plain-text retry, or the 30 s budget expiring.

use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use futures_util::future::join_all;
use serde_json::json;
use tracing::{info, warn};

use crate::{
    clock,
    engine::enricher::{enrich, EnrichOutcome},
    engine::formatter,
    error::AppError,
    market::vendor::SIMULATED_TEST,
    models::{EnrichedAlert, PersistedAlert, WebhookPayload},
    state::SharedState,
};

/// Bounded fan-out for enrichment within one request.
const ENRICH_CONCURRENCY: usize = 5;
/// Whole-request budget; past this we reply 500 with partial work recorded.
const REQUEST_BUDGET: Duration = Duration::from_secs(30);

const SECRET_HEADER: &str = "x-webhook-secret";

// ─── POST /webhook ────────────────────────────────────────────────────────────

pub async fn handle_webhook(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Option<Json<serde_json::Value>>,
) -> Result<impl IntoResponse, AppError> {
    let started = Instant::now();

    // ── received → authenticated ──────────────────────────────────────────
    if let Some(secret) = &state.config.webhook_secret {
        let provided = headers
            .get(SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if provided != secret {
            warn!("webhook rejected — bad or missing {SECRET_HEADER}");
            return Err(AppError::Unauthorized(
                "invalid or missing x-webhook-secret header".to_string(),
            ));
        }
    }
    state.status.record_webhook();

    // ── authenticated → decoded ───────────────────────────────────────────
    let Some(Json(value)) = body else {
        return Err(AppError::BadRequest("request body must be JSON".to_string()));
    };
    let payload: WebhookPayload = serde_json::from_value(value)
        .map_err(|_| AppError::BadRequest("unrecognized payload shape".to_string()))?;
    let (symbols, scan_name) = payload.into_parts();
    if symbols.is_empty() {
        return Err(AppError::BadRequest("payload carried no symbols".to_string()));
    }

    // ── decoded → … → recorded, under the request budget ─────────────────
    let outcome = tokio::time::timeout(
        REQUEST_BUDGET,
        process(&state, &symbols, scan_name.as_deref()),
    )
    .await;

    state.status.record_response_time(started.elapsed());

    match outcome {
        Ok(Ok(reply)) => Ok(Json(reply)),
        Ok(Err(e)) => {
            state.status.record_error("webhook", &format!("{e}"));
            Err(e)
        }
        Err(_) => {
            state
                .status
                .record_error("webhook", "request exceeded the 30s budget");
            Err(AppError::Internal(anyhow::anyhow!(
                "request exceeded the 30s budget; completed work was recorded"
            )))
        }
    }
}

/// decoded → enriched → dispatched → recorded.  Returns the reply body.
async fn process(
    state: &SharedState,
    symbols: &[String],
    scan_name: Option<&str>,
) -> Result<serde_json::Value, AppError> {
    // ── enriched: bounded fan-out, per-symbol failures are skipped ────────
    let mut alerts: Vec<EnrichedAlert> = Vec::with_capacity(symbols.len());
    for batch in symbols.chunks(ENRICH_CONCURRENCY) {
        let fetches = batch
            .iter()
            .map(|symbol| async { (symbol.clone(), enrich(&state.cache, symbol, scan_name).await) });
        for (symbol, outcome) in join_all(fetches).await {
            match outcome {
                EnrichOutcome::Enriched(alert) => alerts.push(*alert),
                EnrichOutcome::Filtered { reason } => {
                    info!(symbol = %symbol, reason, "symbol filtered out");
                }
                EnrichOutcome::Unavailable => {
                    warn!(symbol = %symbol, "symbol discarded — no market data");
                }
            }
        }
    }

    if alerts.is_empty() {
        return Ok(json!({
            "status": "ignored",
            "reason": "No stocks matched the criteria",
        }));
    }

    // ── recorded: tracker → store → (sink once, after all writes) ─────────
    for alert in &alerts {
        if alert.symbol == SIMULATED_TEST {
            continue;
        }
        if !crate::market::vendor::is_test_symbol(&alert.symbol) {
            state.tracker.track(alert).await;
        }
        state.store.append_alert(PersistedAlert::new(alert.clone())).await;
        if !crate::market::vendor::is_test_symbol(&alert.symbol) {
            state.analytics.record(alert).await;
        }
        state.status.record_alert(&alert.symbol, alert.scan_name.as_deref());
    }

    // ── dispatched: single card or sorted batch, skipping SIMULATED.TEST ──
    let deliverable: Vec<&EnrichedAlert> = alerts
        .iter()
        .filter(|a| a.symbol != SIMULATED_TEST)
        .collect();

    let delivered = if deliverable.is_empty() {
        info!("simulated-only request — nothing dispatched to the sink");
        false
    } else {
        let message = if symbols.len() == 1 && alerts.len() == 1 {
            formatter::format_single(&alerts[0])
        } else {
            let owned: Vec<EnrichedAlert> = deliverable.iter().map(|a| (*a).clone()).collect();
            let sent_at = clock::market_now().format("%d %b %Y, %I:%M %p IST").to_string();
            formatter::format_batch(&owned, scan_name, &sent_at)
        };

        match state.sink.send(&message).await {
            Ok(()) => {
                state.status.record_telegram_result(Ok(()));
                true
            }
            Err(e) => {
                let description = format!("{e:#}");
                state.status.record_telegram_result(Err(&description));
                // Work is already persisted and tracked; the request still
                // fails so the caller knows delivery broke.
                return Err(AppError::SinkFailure(description));
            }
        }
    };

    // ── replied ───────────────────────────────────────────────────────────
    let stocks: Vec<&str> = alerts.iter().map(|a| a.symbol.as_str()).collect();
    info!(count = stocks.len(), delivered, "webhook processed");
    Ok(json!({
        "status": "success",
        "delivered": delivered,
        "stocks": stocks,
    }))
}
