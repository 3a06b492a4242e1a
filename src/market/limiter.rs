//! # market::limiter
//!
//! Sliding-window budget for vendor calls: at most N issued per 60 s.
//! Above 80% of the budget new callers are delayed proportionally to how
//! deep into the soft zone the window already is; at the hard cap they wait
//! for the oldest call to age out.  The delay is a cooperative
//! `tokio::time::sleep`, never a busy loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub struct RateLimiter {
    budget: usize,
    window: Duration,
    issued: Mutex<VecDeque<Instant>>,
    /// Calls currently awaiting a vendor response; counts against the soft
    /// threshold together with recently issued calls.
    inflight: AtomicUsize,
}

impl RateLimiter {
    pub fn new(calls_per_minute: u32) -> Self {
        Self {
            budget: calls_per_minute.max(1) as usize,
            window: Duration::from_secs(60),
            issued: Mutex::new(VecDeque::new()),
            inflight: AtomicUsize::new(0),
        }
    }

    /// Reserve one vendor call, sleeping first if the window is crowded.
    /// Returns a guard that marks the call in-flight until dropped.
    pub async fn acquire(&self) -> InflightGuard<'_> {
        loop {
            let decision = self.admit();
            match decision {
                Admit::Now => break,
                Admit::After(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "rate limiter backing off");
                    tokio::time::sleep(delay).await;
                    break;
                }
                Admit::Retry(wait) => {
                    debug!(wait_ms = wait.as_millis() as u64, "rate limiter window full");
                    tokio::time::sleep(wait).await;
                    // loop: re-check the window after the oldest entry expires
                }
            }
        }

        self.inflight.fetch_add(1, Ordering::SeqCst);
        InflightGuard { limiter: self }
    }

    fn admit(&self) -> Admit {
        let mut issued = self.issued.lock().expect("limiter lock poisoned");
        let now = Instant::now();
        while let Some(&front) = issued.front() {
            if now.duration_since(front) > self.window {
                issued.pop_front();
            } else {
                break;
            }
        }

        let pressure = issued.len() + self.inflight.load(Ordering::SeqCst);
        let soft = (self.budget as f64 * 0.8) as usize;

        if pressure >= self.budget {
            // Hard cap: wait for the oldest issued call to leave the window.
            let wait = issued
                .front()
                .map(|&front| self.window.saturating_sub(now.duration_since(front)))
                .unwrap_or(Duration::from_millis(500))
                .max(Duration::from_millis(50));
            return Admit::Retry(wait);
        }

        issued.push_back(now);
        if pressure >= soft {
            // Proportional back-off: one window-slice per call over the
            // soft threshold.
            let per_call = self.window.as_millis() as u64 / self.budget as u64;
            let excess = (pressure - soft + 1) as u64;
            Admit::After(Duration::from_millis(per_call * excess))
        } else {
            Admit::Now
        }
    }
}

enum Admit {
    Now,
    After(Duration),
    Retry(Duration),
}

/// RAII marker for an in-flight vendor call.
pub struct InflightGuard<'a> {
    limiter: &'a RateLimiter,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.limiter.inflight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn under_soft_threshold_admits_immediately() {
        let limiter = RateLimiter::new(100);
        let started = Instant::now();
        for _ in 0..10 {
            let _guard = limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn over_soft_threshold_delays_proportionally() {
        let limiter = RateLimiter::new(10);
        // Fill the window to the soft threshold (8 of 10).
        for _ in 0..8 {
            let _guard = limiter.acquire().await;
        }
        let before = tokio::time::Instant::now();
        let _guard = limiter.acquire().await;
        // 9th call: one slice (6000ms / 10) of delay expected.
        assert!(before.elapsed() >= Duration::from_millis(600));
    }
}
