//! # market::indicators
//!
//! Pure indicator math over a daily bar series.  All functions are total on
//! valid input and return `None` — never zero — when the series is too short.

use crate::models::{Bar, Indicators};

/// Arithmetic mean of the last `period` values.  `None` if fewer exist.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Wilder-smoothed RSI over `period` differences.
///
/// Seed: simple mean of gains/losses over the first `period` diffs.
/// Iterate: `avg ← (avg·(period−1) + x) / period`.
/// `None` when fewer than `period + 1` closes exist; 100 when the average
/// loss is zero.
pub fn rsi(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let diffs: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let mut avg_gain = diffs[..period].iter().filter(|&&d| d > 0.0).sum::<f64>() / period as f64;
    let mut avg_loss = diffs[..period].iter().filter(|&&d| d < 0.0).map(|d| -d).sum::<f64>()
        / period as f64;

    for &d in &diffs[period..] {
        let (gain, loss) = if d > 0.0 { (d, 0.0) } else { (0.0, -d) };
        avg_gain = (avg_gain * (period - 1) as f64 + gain) / period as f64;
        avg_loss = (avg_loss * (period - 1) as f64 + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}

/// Current volume relative to its 10-period simple average.
pub fn volume_ratio(current_volume: f64, volumes: &[f64]) -> Option<f64> {
    let avg = sma(volumes, 10)?;
    if avg == 0.0 {
        return None;
    }
    Some(current_volume / avg)
}

/// Compute the full indicator bundle from a bar series.
///
/// `current_volume` overrides the last bar's volume for the ratio when the
/// caller has a fresher intraday number from the quote.
pub fn compute(bars: &[Bar], current_volume: Option<f64>) -> Indicators {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let vol_now = current_volume.or_else(|| volumes.last().copied());

    Indicators {
        sma20: sma(&closes, 20),
        sma50: sma(&closes, 50),
        sma200: sma(&closes, 200),
        rsi14: rsi(&closes, 14),
        volume_ratio: vol_now.and_then(|v| volume_ratio(v, &volumes)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_is_absent_one_short_of_the_period() {
        let values: Vec<f64> = (0..19).map(|i| i as f64).collect();
        assert_eq!(sma(&values, 20), None);

        let values: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        assert_eq!(sma(&values, 20), Some(10.5));
    }

    #[test]
    fn sma_uses_only_the_tail() {
        let mut values = vec![1000.0; 5];
        values.extend((1..=3).map(|i| i as f64));
        assert_eq!(sma(&values, 3), Some(2.0));
    }

    #[test]
    fn rsi_needs_period_plus_one_closes() {
        let closes: Vec<f64> = (0..15).map(|i| i as f64).collect();
        assert!(rsi(&closes, 14).is_some());
        assert_eq!(rsi(&closes[..14], 14), None);
    }

    #[test]
    fn rsi_of_monotonic_rise_is_100() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        assert_eq!(rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn rsi_alternating_series_lands_mid_range() {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(value > 30.0 && value < 70.0, "rsi was {value}");
    }

    #[test]
    fn volume_ratio_absent_without_ten_sessions() {
        assert_eq!(volume_ratio(500.0, &[100.0; 9]), None);
        let ratio = volume_ratio(500.0, &[100.0; 10]).unwrap();
        assert!((ratio - 5.0).abs() < 1e-9);
    }

    #[test]
    fn compute_fills_what_the_series_supports() {
        let today = chrono::NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let bars: Vec<Bar> = (0..60)
            .map(|i| Bar {
                date: today - chrono::Duration::days(60 - i),
                open: 99.0,
                high: 101.0,
                low: 98.0,
                close: 100.0 + i as f64 * 0.1,
                adj_close: None,
                volume: 1_000.0,
            })
            .collect();

        let ind = compute(&bars, None);
        assert!(ind.sma20.is_some());
        assert!(ind.sma50.is_some());
        assert!(ind.sma200.is_none(), "only 60 bars, no sma200");
        assert!(ind.rsi14.is_some());
        assert!(ind.volume_ratio.is_some());
    }
}
