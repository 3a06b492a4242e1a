//! # market::cache
//!
//! The [`QuoteCache`] is the only door to the vendor.  It memoizes quotes,
//! summaries and historical bars under a TTL, coalesces concurrent fetches
//! for the same key onto a single in-flight call, and consults the
//! [`RateLimiter`](super::limiter::RateLimiter) before every real request.
//!
//! Failures never propagate: a fetch error returns the stale cached value if
//! one exists (else nothing) and reports through the injected error hook —
//! the cache deliberately has no direct reference to the Status Monitor.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::market::limiter::RateLimiter;
use crate::market::vendor::{
    self, fixture_history, fixture_quote, is_test_symbol, MarketVendor,
};
use crate::models::{Bar, Quote, Summary};

/// Callback invoked with a short description whenever a vendor fetch fails.
pub type FetchErrorHook = Arc<dyn Fn(&str) + Send + Sync>;

// ─── Generic Memo ─────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Fetched<T> {
    Found(T),
    Missing,
    Failed,
}

struct MemoSlot<T> {
    /// Last good value with its fetch time.
    last: Option<(Instant, T)>,
    /// Last authoritative not-found, also honoured for one TTL so unknown
    /// symbols do not hammer the vendor.
    miss_at: Option<Instant>,
    inflight: Option<Arc<OnceCell<Fetched<T>>>>,
}

impl<T> Default for MemoSlot<T> {
    fn default() -> Self {
        Self {
            last: None,
            miss_at: None,
            inflight: None,
        }
    }
}

/// TTL memo with at-most-one-fetch-per-key coalescing.
struct Memo<T> {
    ttl: Duration,
    map: Mutex<HashMap<String, MemoSlot<T>>>,
}

impl<T: Clone> Memo<T> {
    fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            map: Mutex::new(HashMap::new()),
        }
    }

    async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = anyhow::Result<Option<T>>>,
    {
        // Fast path under the lock; the lock is never held across an await.
        let cell = {
            let mut map = self.map.lock().expect("memo lock poisoned");
            let slot = map.entry(key.to_string()).or_default();
            let now = Instant::now();

            if let Some((at, value)) = &slot.last {
                if now.duration_since(*at) < self.ttl {
                    return Some(value.clone());
                }
            }
            if let Some(at) = slot.miss_at {
                if now.duration_since(at) < self.ttl {
                    return None;
                }
            }
            slot.inflight
                .get_or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        // Everyone holding this cell awaits the same fetch; exactly one
        // caller's closure runs.
        let outcome = cell
            .get_or_init(|| async {
                match fetch().await {
                    Ok(Some(value)) => Fetched::Found(value),
                    Ok(None) => Fetched::Missing,
                    Err(_) => Fetched::Failed,
                }
            })
            .await
            .clone();

        let mut map = self.map.lock().expect("memo lock poisoned");
        let slot = map.entry(key.to_string()).or_default();
        let ours = slot
            .inflight
            .as_ref()
            .map(|c| Arc::ptr_eq(c, &cell))
            .unwrap_or(false);
        if ours {
            slot.inflight = None;
            match &outcome {
                Fetched::Found(value) => {
                    slot.last = Some((Instant::now(), value.clone()));
                    slot.miss_at = None;
                }
                Fetched::Missing => slot.miss_at = Some(Instant::now()),
                Fetched::Failed => {}
            }
        }

        match outcome {
            Fetched::Found(value) => Some(value),
            Fetched::Missing => None,
            // Transient failure: serve the stale value when we have one.
            Fetched::Failed => slot.last.as_ref().map(|(_, v)| v.clone()),
        }
    }
}

// ─── Quote Cache ──────────────────────────────────────────────────────────────

pub struct QuoteCache {
    vendor: Arc<dyn MarketVendor>,
    limiter: RateLimiter,
    default_suffix: String,
    quotes: Memo<Quote>,
    summaries: Memo<Summary>,
    history: Memo<Vec<Bar>>,
    on_fetch_error: FetchErrorHook,
}

impl QuoteCache {
    pub fn new(
        vendor: Arc<dyn MarketVendor>,
        ttl: Duration,
        calls_per_minute: u32,
        default_suffix: String,
        on_fetch_error: FetchErrorHook,
    ) -> Self {
        Self {
            vendor,
            limiter: RateLimiter::new(calls_per_minute),
            default_suffix,
            quotes: Memo::new(ttl),
            summaries: Memo::new(ttl),
            history: Memo::new(ttl),
            on_fetch_error,
        }
    }

    /// Apply the configured exchange suffix to a bare symbol.
    pub fn normalize(&self, raw: &str) -> String {
        vendor::normalize_symbol(raw, &self.default_suffix)
    }

    pub async fn quote(&self, raw_symbol: &str) -> Option<Quote> {
        let symbol = self.normalize(raw_symbol);
        if is_test_symbol(&symbol) {
            return Some(fixture_quote(&symbol));
        }

        self.quotes
            .get_or_fetch(&symbol, || async {
                let _guard = self.limiter.acquire().await;
                debug!(symbol = %symbol, "fetching quote");
                match self.vendor.quote(&symbol).await {
                    Ok(Some(quote)) => Ok(Some(quote)),
                    // An authoritative miss counts against the data-fetch
                    // counter too, once per TTL.
                    Ok(None) => {
                        self.report(&format!("no quote data for {symbol}"));
                        Ok(None)
                    }
                    Err(e) => {
                        self.report(&format!("quote {symbol}: {e:#}"));
                        Err(e)
                    }
                }
            })
            .await
    }

    pub async fn summary(&self, raw_symbol: &str) -> Option<Summary> {
        let symbol = self.normalize(raw_symbol);
        if is_test_symbol(&symbol) {
            return Some(Summary {
                symbol: symbol.clone(),
                long_name: Some("Deterministic test instrument".to_string()),
                exchange: Some("TEST".to_string()),
                currency: Some("INR".to_string()),
                fifty_two_week_high: Some(110.0),
                fifty_two_week_low: Some(70.0),
                market_cap: None,
            });
        }

        self.summaries
            .get_or_fetch(&symbol, || async {
                let _guard = self.limiter.acquire().await;
                debug!(symbol = %symbol, "fetching summary");
                self.vendor.summary(&symbol).await.map_err(|e| {
                    self.report(&format!("summary {symbol}: {e:#}"));
                    e
                })
            })
            .await
    }

    /// Historical daily bars.  Empty on unknown symbol or failure with no
    /// stale data.
    pub async fn history(&self, raw_symbol: &str, interval: &str, range: &str) -> Vec<Bar> {
        let symbol = self.normalize(raw_symbol);
        if is_test_symbol(&symbol) {
            return fixture_history(&symbol);
        }

        let key = format!("{symbol}|{interval}|{range}");
        self.history
            .get_or_fetch(&key, || async {
                let _guard = self.limiter.acquire().await;
                debug!(symbol = %symbol, interval, range, "fetching history");
                match self.vendor.history(&symbol, interval, range).await {
                    Ok(bars) if bars.is_empty() => Ok(None),
                    Ok(bars) => Ok(Some(bars)),
                    Err(e) => {
                        self.report(&format!("history {symbol}: {e:#}"));
                        Err(e)
                    }
                }
            })
            .await
            .unwrap_or_default()
    }

    fn report(&self, description: &str) {
        warn!("vendor fetch failed: {description}");
        (self.on_fetch_error)(description);
    }
}
