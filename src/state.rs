//! # state
//!
//! The gateway's shared application state: one `Arc<AppState>` cloned into
//! every Axum handler.  All long-lived singletons (cache, tracker,
//! analytics, status, store) are constructed explicitly in [`build_state`] —
//! nothing materialises as a side effect of module import — and torn down
//! through [`AppState::shutdown`].
//!
//! The Quote Cache never references the Status Monitor directly; it gets a
//! recording callback at construction so the dependency edge points one way.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analytics::Analytics;
use crate::config::Config;
use crate::market::cache::FetchErrorHook;
use crate::market::{MarketVendor, QuoteCache, YahooChartClient};
use crate::notify::{AlertSink, DisabledSink, TelegramClient};
use crate::status::StatusMonitor;
use crate::store::{MongoStore, RemoteStore, Store};
use crate::tracker::Tracker;

pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub cache: Arc<QuoteCache>,
    pub sink: Arc<dyn AlertSink>,
    pub store: Arc<Store>,
    pub tracker: Arc<Tracker>,
    pub analytics: Arc<Analytics>,
    pub status: Arc<StatusMonitor>,
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

/// Injectable collaborators; production uses [`build_state`], tests swap in
/// doubles via [`build_state_with`].
pub struct Collaborators {
    pub vendor: Arc<dyn MarketVendor>,
    pub sink: Arc<dyn AlertSink>,
    pub remote: Option<Arc<dyn RemoteStore>>,
}

/// Wire up the production collaborators from config.
pub async fn build_state(config: Config) -> anyhow::Result<SharedState> {
    let http_client = reqwest::Client::new();

    let vendor: Arc<dyn MarketVendor> = Arc::new(YahooChartClient::new(http_client.clone()));

    let sink: Arc<dyn AlertSink> = match &config.telegram {
        Some(telegram) => Arc::new(TelegramClient::new(http_client.clone(), telegram)),
        None => Arc::new(DisabledSink),
    };

    let remote: Option<Arc<dyn RemoteStore>> = match &config.mongodb_uri {
        Some(uri) => match MongoStore::connect(uri).await {
            Ok(store) => Some(Arc::new(store)),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "remote store unreachable — local-only mode");
                None
            }
        },
        None => {
            info!("MONGODB_URI not set — store runs in local-only mode");
            None
        }
    };

    build_state_with(config, Collaborators { vendor, sink, remote }, http_client).await
}

/// Assemble the state from explicit collaborators.
pub async fn build_state_with(
    config: Config,
    parts: Collaborators,
    http_client: reqwest::Client,
) -> anyhow::Result<SharedState> {
    let status = Arc::new(StatusMonitor::init(&config.data_dir).await?);

    let on_fetch_error: FetchErrorHook = {
        let status = status.clone();
        Arc::new(move |description| status.record_data_fetch_error(description))
    };

    let cache = Arc::new(QuoteCache::new(
        parts.vendor,
        config.cache_ttl,
        config.vendor_calls_per_min,
        config.default_exchange_suffix.clone(),
        on_fetch_error,
    ));

    let store = Arc::new(Store::open(&config.data_dir, parts.remote).await?);
    let tracker = Arc::new(Tracker::init(&config.data_dir).await?);
    let analytics = Arc::new(Analytics::init(&config.data_dir).await?);

    Ok(Arc::new(AppState {
        config,
        http_client,
        cache,
        sink: parts.sink,
        store,
        tracker,
        analytics,
        status,
    }))
}

impl AppState {
    /// Flush durable state and send the best-effort shutdown notice.
    pub async fn shutdown(&self) {
        if self.sink.is_enabled() {
            if let Err(e) = self.sink.send("🛑 Stock alert gateway shutting down").await {
                warn!(error = %format!("{e:#}"), "shutdown notice failed");
            }
        }
        self.status.checkpoint().await;
        self.analytics.checkpoint().await;
        info!("state flushed — goodbye");
    }
}
