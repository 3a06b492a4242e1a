//! # stockalert — stock-scan ingress gateway
//!
//! ```text
//!  ┌──────────────┐  POST /webhook   ┌───────────────────────────────┐
//!  │ Scan platform│ ───────────────▶ │ AppState                      │
//!  └──────────────┘                  │ ├─ QuoteCache (TTL + limiter) │
//!                                    │ ├─ Tracker     (intraday)     │
//!  ┌──────────────┐  sendMessage     │ ├─ Analytics   (rollups)      │
//!  │  Telegram    │ ◀─────────────── │ ├─ Store       (remote+local) │
//!  └──────────────┘                  │ └─ StatusMonitor              │
//!                                    └───────────────────────────────┘
//!  ┌──────────────┐  GET /status /analytics /api/*
//!  │  Dashboard   │ ───────────────▶ scheduler: 15:30 IST daily digest
//!  └──────────────┘
//! ```
//!
//! Library surface exists so the integration tests can assemble the router
//! around scripted collaborators; the binary in `main.rs` stays thin.

pub mod analytics;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod market;
pub mod models;
pub mod notify;
pub mod routes;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod store;
pub mod tracker;
