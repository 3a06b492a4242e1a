//! # config — runtime configuration from environment variables
//!
//! Read once at startup into [`Config`]; nothing in the request path touches
//! `std::env` directly.
//!
//! | Variable                  | Default  | Description                          |
//! |---------------------------|----------|--------------------------------------|
//! | `PORT`                    | `3000`   | HTTP listen port                     |
//! | `TELEGRAM_BOT_TOKEN`      | —        | Bot token (unset → sink disabled)    |
//! | `TELEGRAM_CHAT_ID`        | —        | Destination chat                     |
//! | `WEBHOOK_SECRET`          | unset    | Shared secret for `x-webhook-secret` |
//! | `MONGODB_URI`             | unset    | Remote store; unset → local-only     |
//! | `DATA_DIR`                | `data`   | On-disk state directory              |
//! | `CACHE_TTL_SECS`          | `900`    | Quote/summary/history TTL            |
//! | `VENDOR_CALLS_PER_MIN`    | `100`    | Sliding rate-limit budget            |
//! | `DEFAULT_EXCHANGE_SUFFIX` | `.NS`    | Appended to bare symbols             |
//! | `DIGEST_TIME`             | `15:30`  | Daily digest time (market TZ)        |

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

/// Everything the gateway needs, resolved once.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` when the bot token or chat id is missing — alerts are then
    /// logged instead of sent.
    pub telegram: Option<TelegramConfig>,
    pub webhook_secret: Option<String>,
    pub mongodb_uri: Option<String>,
    pub data_dir: PathBuf,
    pub cache_ttl: Duration,
    pub vendor_calls_per_min: u32,
    pub default_exchange_suffix: String,
    /// Local (market TZ) hour and minute the digest fires on weekdays.
    pub digest_hour: u32,
    pub digest_minute: u32,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl Config {
    pub fn from_env() -> Self {
        let telegram = match (
            std::env::var("TELEGRAM_BOT_TOKEN").ok().filter(|v| !v.is_empty()),
            std::env::var("TELEGRAM_CHAT_ID").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            _ => {
                warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set — alerts will be logged only");
                None
            }
        };

        let (digest_hour, digest_minute) = parse_digest_time(
            &std::env::var("DIGEST_TIME").unwrap_or_else(|_| "15:30".to_string()),
        );

        Self {
            port: env_parse("PORT", 3000),
            telegram,
            webhook_secret: std::env::var("WEBHOOK_SECRET").ok().filter(|v| !v.is_empty()),
            mongodb_uri: std::env::var("MONGODB_URI").ok().filter(|v| !v.is_empty()),
            data_dir: PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into())),
            cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", 900)),
            vendor_calls_per_min: env_parse("VENDOR_CALLS_PER_MIN", 100),
            default_exchange_suffix: std::env::var("DEFAULT_EXCHANGE_SUFFIX")
                .unwrap_or_else(|_| ".NS".to_string()),
            digest_hour,
            digest_minute,
        }
    }
}

/// `HH:MM` → (hour, minute).  A malformed value falls back to 15:30 — the
/// scheduler is best-effort, not a reason to refuse startup.
fn parse_digest_time(raw: &str) -> (u32, u32) {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() == 2 {
        if let (Ok(h), Ok(m)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
            if h < 24 && m < 60 {
                return (h, m);
            }
        }
    }
    warn!(raw, "DIGEST_TIME unparseable — using 15:30");
    (15, 30)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_time_parses_valid_and_rejects_garbage() {
        assert_eq!(parse_digest_time("15:30"), (15, 30));
        assert_eq!(parse_digest_time("9:05"), (9, 5));
        assert_eq!(parse_digest_time("25:00"), (15, 30));
        assert_eq!(parse_digest_time("noon"), (15, 30));
    }
}
