//! # engine::formatter
//!
//! Renders enriched alerts into Telegram-markdown messages.  Pure string
//! assembly, never suspends.  Two modes: a detailed single-symbol card and a
//! compact batch listing sorted by smallest stop distance.
//!
//! Monetary values print with 2 decimals; percentages with 2 decimals and an
//! explicit `+` for positive values.  `strip_markdown` produces the plain
//! fallback used when the chat platform rejects the markdown body.

use crate::models::{EnrichedAlert, ScanType};

/// `+2.39%` / `-1.20%` / `0.00%`.
pub fn fmt_pct(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}

fn fmt_money(value: f64) -> String {
    format!("₹{value:.2}")
}

fn direction_arrow(percent_change: Option<f64>) -> &'static str {
    match percent_change {
        Some(p) if p > 0.0 => "🔼",
        Some(p) if p < 0.0 => "🔽",
        _ => "➖",
    }
}

fn advisory(scan_type: ScanType) -> &'static str {
    match scan_type {
        ScanType::OpenEqualsLow => {
            "⚡ Opened at the low of the day. Watch for continuation while price holds the 20-SMA."
        }
        ScanType::Custom => "📌 Review the chart before acting. Alerts are not trade advice.",
        ScanType::Default => "📌 Unnamed scan trigger. Review the chart before acting.",
    }
}

/// Detailed card for exactly one alert.
pub fn format_single(alert: &EnrichedAlert) -> String {
    let mut lines: Vec<String> = Vec::with_capacity(8);

    lines.push(format!("🚨 *{}*", alert.symbol));
    if let Some(scan) = &alert.scan_name {
        lines.push(format!("📊 Scan: {scan}"));
    }
    lines.push(String::new());

    let pct = alert
        .percent_change
        .map(fmt_pct)
        .unwrap_or_else(|| "n/a".to_string());
    lines.push(format!(
        "💰 Price: {} {} ({pct})",
        fmt_money(alert.close),
        direction_arrow(alert.percent_change),
    ));

    let distance = alert
        .sl_distance_pct
        .map(|d| format!("{d:.2}% away"))
        .unwrap_or_else(|| "n/a".to_string());
    lines.push(format!(
        "🛑 Stop Loss: {} ({distance})",
        fmt_money(alert.stop_loss)
    ));

    match alert.sma20 {
        Some(sma) => lines.push(format!("📈 20-SMA: {}", fmt_money(sma))),
        None => lines.push("📈 20-SMA: n/a".to_string()),
    }

    lines.push(String::new());
    lines.push(advisory(alert.scan_type).to_string());

    lines.join("\n")
}

/// Compact listing for a batch, ordered by ascending stop distance
/// (tightest stop first).  `sent_at_line` is the pre-rendered local
/// timestamp so the formatter itself stays clock-free.
pub fn format_batch(
    alerts: &[EnrichedAlert],
    scan_name: Option<&str>,
    sent_at_line: &str,
) -> String {
    let mut sorted: Vec<&EnrichedAlert> = alerts.iter().collect();
    sorted.sort_by(|a, b| {
        a.sl_distance_or_compute()
            .partial_cmp(&b.sl_distance_or_compute())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut lines: Vec<String> = Vec::with_capacity(sorted.len() + 6);
    lines.push("🚨 *Stock Scan Alert*".to_string());
    if let Some(scan) = scan_name {
        lines.push(format!("📊 Scan: {scan}"));
    }
    lines.push(format!("🕒 {sent_at_line}"));
    lines.push(String::new());

    for (i, alert) in sorted.iter().enumerate() {
        let pct = alert
            .percent_change
            .map(fmt_pct)
            .unwrap_or_else(|| "n/a".to_string());
        lines.push(format!(
            "{}. *{}* @ {} | SL {} ({:.2}%) | {pct}",
            i + 1,
            alert.symbol,
            fmt_money(alert.close),
            fmt_money(alert.stop_loss),
            alert.sl_distance_or_compute(),
        ));
    }

    lines.push(String::new());
    let open_equals_low = alerts
        .iter()
        .all(|a| a.scan_type == ScanType::OpenEqualsLow);
    if open_equals_low && !alerts.is_empty() {
        lines.push("📝 All stocks opened at their low of the day.".to_string());
    } else {
        lines.push(format!(
            "📝 {} stocks sorted by smallest stop loss %",
            alerts.len()
        ));
    }

    lines.join("\n")
}

/// Remove Telegram markdown markers for the plain-text retry.
pub fn strip_markdown(text: &str) -> String {
    text.chars().filter(|c| !matches!(c, '*' | '_' | '`')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn alert(symbol: &str, sl_distance: f64) -> EnrichedAlert {
        EnrichedAlert {
            symbol: symbol.to_string(),
            scan_name: Some("X".to_string()),
            scan_type: ScanType::Custom,
            open: 100.0,
            high: 104.0,
            low: 98.0,
            close: 100.0,
            volume: 1_000.0,
            sma20: Some(99.0),
            stop_loss: 100.0 - sl_distance,
            percent_change: Some(1.5),
            sl_distance_pct: Some(sl_distance),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn positive_percentages_carry_an_explicit_sign() {
        assert_eq!(fmt_pct(2.39), "+2.39%");
        assert_eq!(fmt_pct(-1.2), "-1.20%");
        assert_eq!(fmt_pct(0.0), "0.00%");
    }

    #[test]
    fn batch_orders_by_ascending_stop_distance() {
        let alerts = vec![alert("A.NS", 3.0), alert("B.NS", 1.2), alert("C.NS", 2.1)];
        let message = format_batch(&alerts, Some("X"), "now");

        let a = message.find("A.NS").unwrap();
        let b = message.find("B.NS").unwrap();
        let c = message.find("C.NS").unwrap();
        assert!(b < c && c < a, "expected B, C, A order:\n{message}");
        assert!(message.contains("3 stocks sorted by smallest stop loss %"));
    }

    #[test]
    fn batch_computes_missing_stop_distance_on_the_fly() {
        let mut first = alert("A.NS", 3.0);
        first.sl_distance_pct = None;
        let alerts = vec![first, alert("B.NS", 1.2)];
        let message = format_batch(&alerts, None, "now");
        assert!(message.find("B.NS").unwrap() < message.find("A.NS").unwrap());
    }

    #[test]
    fn single_card_has_price_stop_and_sma_lines() {
        let message = format_single(&alert("RELIANCE.NS", 2.0));
        assert!(message.contains("🚨 *RELIANCE.NS*"));
        assert!(message.contains("💰 Price: ₹100.00 🔼 (+1.50%)"));
        assert!(message.contains("🛑 Stop Loss: ₹98.00 (2.00% away)"));
        assert!(message.contains("📈 20-SMA: ₹99.00"));
    }

    #[test]
    fn open_equals_low_batch_gets_the_condition_footer() {
        let mut a = alert("A.NS", 1.0);
        a.scan_type = ScanType::OpenEqualsLow;
        let mut b = alert("B.NS", 2.0);
        b.scan_type = ScanType::OpenEqualsLow;
        let message = format_batch(&[a, b], Some("Open=Low"), "now");
        assert!(message.contains("opened at their low"));
    }

    #[test]
    fn strip_markdown_removes_markers_and_is_idempotent() {
        let message = format_single(&alert("TCS.NS", 1.0));
        let plain = strip_markdown(&message);
        assert!(!plain.contains('*'));
        assert_eq!(strip_markdown(&plain), plain);
        assert!(plain.contains("TCS.NS"));
    }
}
