//! # engine::stop_loss
//!
//! The protective-exit rule.  Pure function, never suspends.
//!
//! The exit is the day low — except when the 20-SMA sits just below the low
//! (within 2%), where the SMA is the better line: intraday support tends to
//! get probed a fraction below the low before the move resumes.

/// Derive the stop-loss from the day low and the optional 20-SMA.
///
/// Invariant: the result is always ≤ `day_low`, and equals `sma20` exactly
/// when `day_low · 0.98 < sma20 < day_low`.
pub fn stop_loss(day_low: f64, sma20: Option<f64>) -> f64 {
    match sma20 {
        Some(sma) if sma < day_low && sma > day_low * 0.98 => sma,
        _ => day_low,
    }
}
