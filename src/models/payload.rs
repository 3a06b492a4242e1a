//! # models::payload
//!
//! The webhook body arrives in one of three shapes, all of which decode into
//! the same `(symbols, scan_name)` view:
//!
//! ```json
//! {"symbol": "RELIANCE", "scan_name": "Open=Low Breakout"}
//! {"symbols": ["A", "B"], "scan_name": "Momentum"}
//! [{"symbol": "A", "scan_name": "X"}, {"symbol": "B"}]
//! ```
//!
//! For the array shape the scan name is inherited from the first element
//! that carries one.

use serde::Deserialize;

/// One element of the array-shaped payload.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadItem {
    pub symbol: String,
    #[serde(default)]
    pub scan_name: Option<String>,
}

/// The three accepted webhook payload shapes.
///
/// `untagged` tries variants in declaration order; `Multi` is listed before
/// `Single` so a body carrying `symbols` never half-matches on `symbol`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WebhookPayload {
    Multi {
        symbols: Vec<String>,
        #[serde(default)]
        scan_name: Option<String>,
    },
    Single {
        symbol: String,
        #[serde(default)]
        scan_name: Option<String>,
    },
    List(Vec<PayloadItem>),
}

impl WebhookPayload {
    /// Flatten into the list of non-empty symbols plus the effective scan
    /// name.  Whitespace-only symbols are dropped here so the Enricher never
    /// sees them.
    pub fn into_parts(self) -> (Vec<String>, Option<String>) {
        match self {
            WebhookPayload::Single { symbol, scan_name } => {
                let symbols = if symbol.trim().is_empty() {
                    vec![]
                } else {
                    vec![symbol.trim().to_string()]
                };
                (symbols, scan_name)
            }
            WebhookPayload::Multi { symbols, scan_name } => {
                let symbols = symbols
                    .into_iter()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (symbols, scan_name)
            }
            WebhookPayload::List(items) => {
                let scan_name = items.iter().find_map(|i| i.scan_name.clone());
                let symbols = items
                    .into_iter()
                    .map(|i| i.symbol.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                (symbols, scan_name)
            }
        }
    }
}
