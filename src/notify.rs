//! # notify — chat-platform sink
//!
//! The [`AlertSink`] port plus the production Telegram implementation.
//! Delivery is best-effort: the Telegram Bot API occasionally rejects a
//! markdown body over an unescaped character, so a failed send is retried
//! once as plain text before the error surfaces.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::config::TelegramConfig;
use crate::engine::formatter::strip_markdown;

/// Chat-platform port.  `send` delivers one message, handling the
/// markdown-to-plain retry internally.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, text: &str) -> anyhow::Result<()>;

    /// Whether messages actually leave the process.
    fn is_enabled(&self) -> bool {
        true
    }
}

// ─── Telegram ─────────────────────────────────────────────────────────────────

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    chat_id: String,
}

impl TelegramClient {
    pub fn new(http: reqwest::Client, config: &TelegramConfig) -> Self {
        Self::with_base_url(http, config, "https://api.telegram.org".to_string())
    }

    /// Used by tests to point the client at a local stub server.
    pub fn with_base_url(
        http: reqwest::Client,
        config: &TelegramConfig,
        base_url: String,
    ) -> Self {
        Self {
            http,
            base_url,
            token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }

    async fn send_once(&self, text: &str, markdown: bool) -> anyhow::Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if markdown {
            body["parse_mode"] = json!("Markdown");
        }

        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Telegram API unreachable")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Telegram rejected message ({status}): {detail}");
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramClient {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        match self.send_once(text, true).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(error = %first, "markdown send failed — retrying as plain text");
                self.send_once(&strip_markdown(text), false)
                    .await
                    .with_context(|| format!("plain-text retry also failed (first: {first})"))
            }
        }
    }
}

// ─── Disabled Sink ────────────────────────────────────────────────────────────

/// Stands in when `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` are unset:
/// messages are logged and dropped.
pub struct DisabledSink;

#[async_trait]
impl AlertSink for DisabledSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        info!(chars = text.len(), "telegram disabled — alert logged only");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
