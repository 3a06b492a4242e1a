//! # scheduler — background loops
//!
//! Two long-lived tasks spawned at startup:
//!
//! * the digest loop, which sleeps until the next weekday `DIGEST_TIME`
//!   (market timezone) and runs the end-of-day sequence;
//! * the checkpoint loop, which flushes status counters every 5 minutes
//!   and rolls the per-day counters over the trading-day boundary.
//!
//! [`run_daily_digest`] is also callable directly from `GET /daily-summary`.

use tracing::{error, info, warn};

use crate::{clock, models::DailySummary, state::SharedState, status};

/// Sleep until the next digest slot, fire, repeat.  Weekend days never get a
/// slot; an empty day still publishes the "no alerts" digest.
pub async fn digest_loop(state: SharedState) {
    loop {
        let at = clock::next_digest_instant(state.config.digest_hour, state.config.digest_minute);
        let wait = (at - chrono::Utc::now())
            .to_std()
            .unwrap_or_default();
        info!(fire_at = %at, "digest scheduled");
        tokio::time::sleep(wait).await;

        match run_daily_digest(&state).await {
            Ok(summary) => info!(
                total = summary.total_alerts,
                win_rate = summary.win_rate,
                "daily digest published"
            ),
            Err(e) => {
                error!(error = %format!("{e:#}"), "daily digest failed");
                state.status.record_error("digest", &format!("{e:#}"));
            }
        }
    }
}

/// The end-of-day sequence: refresh prices and build the digest, record
/// stop-outs into analytics, persist the summary, send it, then archive the
/// tracker and flush analytics.
pub async fn run_daily_digest(state: &SharedState) -> anyhow::Result<DailySummary> {
    let summary = state.tracker.digest(&state.cache).await;

    for entry in state.tracker.entries().await {
        if entry.hit_stop_loss {
            state
                .analytics
                .record_stop_out(&entry.symbol, entry.scan_name.as_deref())
                .await;
        }
    }

    state.store.upsert_summary(&summary).await;

    match state.sink.send(&summary.message_text).await {
        Ok(()) => state.status.record_telegram_result(Ok(())),
        Err(e) => {
            let description = format!("{e:#}");
            state.status.record_telegram_result(Err(&description));
            warn!(error = %description, "digest delivery failed — state still rolls over");
        }
    }

    state.tracker.rollover().await?;
    state.analytics.checkpoint().await;

    Ok(summary)
}

/// Flush counters periodically and keep the per-day window honest even when
/// no webhooks arrive overnight.
pub async fn checkpoint_loop(state: SharedState) {
    let mut ticker = tokio::time::interval(status::CHECKPOINT_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        state.status.roll_day_if_needed();
        state.status.checkpoint().await;
    }
}
