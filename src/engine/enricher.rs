//! # engine::enricher
//!
//! Turns `(symbol, scan name)` into an [`EnrichedAlert`]: live quote,
//! 20-SMA, derived stop-loss and a scan-typed classification.  The open=low
//! scan additionally filters out symbols whose tape does not confirm the
//! pattern.

use chrono::Utc;
use tracing::debug;

use crate::engine::stop_loss::stop_loss;
use crate::market::{indicators, QuoteCache};
use crate::models::{EnrichedAlert, Indicators, ScanType};

/// Tolerance for the open-equals-low comparison, in price units.
const OPEN_LOW_TOLERANCE: f64 = 0.01;

/// Outcome of enriching a single symbol.
#[derive(Debug)]
pub enum EnrichOutcome {
    Enriched(Box<EnrichedAlert>),
    /// The scan's filters rejected the symbol; not an error.
    Filtered { reason: &'static str },
    /// The vendor had nothing for this symbol.
    Unavailable,
}

/// Enrich one symbol.  The caller guarantees `symbol` is non-empty.
pub async fn enrich(cache: &QuoteCache, symbol: &str, scan_name: Option<&str>) -> EnrichOutcome {
    let Some(quote) = cache.quote(symbol).await else {
        return EnrichOutcome::Unavailable;
    };

    // SMA20 is wanted downstream but its absence is tolerated — the
    // stop-loss rule and the open=low filter both handle a missing SMA.
    let bars = cache.history(symbol, "1d", "1y").await;
    let ind = indicators::compute(&bars, Some(quote.volume));

    let scan_type = ScanType::from_scan_name(scan_name);

    if scan_type == ScanType::OpenEqualsLow {
        if let Some(reason) = open_equals_low_rejection(quote.open, quote.low, quote.close, &ind) {
            debug!(symbol = %quote.symbol, reason, "open=low filter rejected symbol");
            return EnrichOutcome::Filtered { reason };
        }
    }

    let sl = stop_loss(quote.low, ind.sma20);
    let percent_change = (quote.open != 0.0)
        .then(|| (quote.close - quote.open) / quote.open * 100.0);
    let sl_distance_pct = (quote.close != 0.0)
        .then(|| (quote.close - sl) / quote.close * 100.0);

    EnrichOutcome::Enriched(Box::new(EnrichedAlert {
        symbol: quote.symbol,
        scan_name: scan_name.map(str::to_string),
        scan_type,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        volume: quote.volume,
        sma20: ind.sma20,
        stop_loss: sl,
        percent_change,
        sl_distance_pct,
        received_at: Utc::now(),
    }))
}

/// The open=low admission rule: the open must sit on the day low (within a
/// paisa) and, when a 20-SMA exists, price must trade above it.
/// Returns the rejection reason, or `None` when the symbol passes.
pub fn open_equals_low_rejection(
    open: f64,
    low: f64,
    close: f64,
    ind: &Indicators,
) -> Option<&'static str> {
    if (open - low).abs() > OPEN_LOW_TOLERANCE {
        return Some("open does not equal low");
    }
    match ind.sma20 {
        Some(sma) if close <= sma => Some("close below 20-SMA"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ind(sma20: Option<f64>) -> Indicators {
        Indicators {
            sma20,
            ..Default::default()
        }
    }

    #[test]
    fn admits_when_open_equals_low_and_close_above_sma() {
        assert_eq!(
            open_equals_low_rejection(2950.0, 2950.0, 3020.45, &ind(Some(2930.0))),
            None
        );
    }

    #[test]
    fn admits_within_one_paisa() {
        assert_eq!(
            open_equals_low_rejection(100.0, 99.995, 101.0, &ind(None)),
            None
        );
    }

    #[test]
    fn rejects_open_away_from_low() {
        assert!(open_equals_low_rejection(100.5, 100.0, 101.0, &ind(None)).is_some());
    }

    #[test]
    fn rejects_close_below_sma() {
        assert!(
            open_equals_low_rejection(2950.0, 2950.0, 2900.0, &ind(Some(2930.0))).is_some()
        );
    }

    #[test]
    fn absent_sma_does_not_reject() {
        assert_eq!(open_equals_low_rejection(2950.0, 2950.0, 2900.0, &ind(None)), None);
    }
}
