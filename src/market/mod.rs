//! # market — vendor access, caching, rate limiting and indicators
//!
//! Everything that talks to (or is derived from) the market-data vendor.
//! The rest of the system only ever goes through [`cache::QuoteCache`]; the
//! raw vendor client is constructed once in `state` and injected.

pub mod cache;
pub mod indicators;
pub mod limiter;
pub mod vendor;

pub use cache::QuoteCache;
pub use vendor::{MarketVendor, YahooChartClient};
