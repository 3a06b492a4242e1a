//! # routes
//!
//! HTTP surface of the gateway.  `webhook` is the write path; everything
//! else is diagnostics and dashboards.

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::SharedState;

pub mod check;
pub mod dashboard;
pub mod webhook;

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/webhook", post(webhook::handle_webhook))
        .route("/health", get(check::health))
        .route("/check/:symbol", get(check::check_symbol))
        .route("/daily-summary", get(check::trigger_daily_summary))
        .route("/test-telegram", get(check::test_telegram))
        .route("/test-multiple", get(check::test_multiple))
        .route("/api/status", get(dashboard::api_status))
        .route("/api/analytics", get(dashboard::api_analytics))
        .route("/api/alerts", get(dashboard::api_alerts))
        .route("/api/summaries", get(dashboard::api_summaries))
        .route("/status", get(dashboard::status_page))
        .route("/analytics", get(dashboard::analytics_page))
        .with_state(state)
}
