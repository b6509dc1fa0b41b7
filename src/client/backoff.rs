//! Per-worker rate-limit governor
//!
//! A reactive backoff state machine wrapping every upstream call:
//! Normal → Backoff → Cooldown → Normal. 429 responses grow an
//! exponential delay with jitter and feed a circuit breaker that
//! opens after five consecutive hits; 503 responses use a fixed
//! multiplier on an independent schedule. The consecutive-hit counter
//! survives across calls for the lifetime of the worker, while the
//! per-request retry budget is bounded.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::FetchError;
use crate::models::ProgressMessage;

/// Tunables for the governor state machine
#[derive(Debug, Clone)]
pub struct GovernorConfig {
    /// Per-request retry budget
    pub max_retries: u32,

    /// Consecutive 429s before the circuit breaker opens
    pub cooldown_threshold: u32,

    /// Base delay for exponential backoff (ms)
    pub base_delay_ms: u64,

    /// Cap on any single backoff delay (ms)
    pub max_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff (ms)
    pub jitter_ms: u64,

    /// Fixed multiplier base for 503 responses (ms)
    pub unavailable_delay_ms: u64,

    /// Circuit-breaker cooldown window (ms)
    pub cooldown_min_ms: u64,
    pub cooldown_max_ms: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            cooldown_threshold: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter_ms: 1000,
            unavailable_delay_ms: 5000,
            cooldown_min_ms: 60_000,
            cooldown_max_ms: 90_000,
        }
    }
}

/// Reactive backoff state machine. One instance per worker; never
/// shared, never persisted.
pub struct RateLimitGovernor {
    config: GovernorConfig,

    /// Consecutive 429s seen across calls; reset on success or cooldown
    consecutive_hits: u32,

    /// Worker index stamped onto cooldown notifications
    worker: usize,

    /// Channel for cooldown notifications, if the owner wants them
    notify: Option<mpsc::Sender<ProgressMessage>>,
}

impl RateLimitGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            consecutive_hits: 0,
            worker: 0,
            notify: None,
        }
    }

    /// Attach a progress channel for `RateLimitCooldown` notifications
    pub fn with_notifier(mut self, worker: usize, tx: mpsc::Sender<ProgressMessage>) -> Self {
        self.worker = worker;
        self.notify = Some(tx);
        self
    }

    /// Current consecutive-hit count (exposed for tests and stats)
    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }

    /// Execute one logical request under governor control.
    ///
    /// The same request is retried on transient errors up to the
    /// per-request budget; permanent errors return immediately. When
    /// the budget is exhausted the last transient error is surfaced so
    /// the caller can tell a rate-limit exhaustion (defer the bill)
    /// from any other terminal failure.
    pub async fn execute<T, F, Fut>(&mut self, operation: F) -> Result<T, FetchError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut last_error = None;

        for attempt in 0..self.config.max_retries {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempt, "Request succeeded after retry");
                    }
                    self.consecutive_hits = 0;
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    self.handle_transient(&e, attempt).await;
                    last_error = Some(e);
                }
            }
        }

        warn!(
            max_retries = self.config.max_retries,
            "Request retry budget exhausted"
        );
        Err(last_error.unwrap_or(FetchError::Timeout))
    }

    /// Sleep according to the error class, advancing the state machine
    async fn handle_transient(&mut self, error: &FetchError, attempt: u32) {
        match error {
            FetchError::RateLimited { retry_after_ms } => {
                self.consecutive_hits += 1;

                if self.consecutive_hits >= self.config.cooldown_threshold {
                    self.enter_cooldown().await;
                } else {
                    let delay = self.backoff_delay(attempt);
                    debug!(
                        attempt,
                        hits = self.consecutive_hits,
                        delay_ms = delay.as_millis() as u64,
                        retry_after_ms = ?retry_after_ms,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            FetchError::ServiceUnavailable => {
                // Fixed multiplier, independent of the 429 counter
                let delay =
                    Duration::from_millis(self.config.unavailable_delay_ms * (attempt as u64 + 1));
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Service unavailable");
                tokio::time::sleep(delay).await;
            }
            _ => {
                let delay = self.backoff_delay(attempt);
                debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }

    /// Circuit breaker: sleep a random 60-90s, reset the counter and
    /// notify the coordinator.
    async fn enter_cooldown(&mut self) {
        let cooldown = self.cooldown_duration();
        warn!(
            hits = self.consecutive_hits,
            cooldown_ms = cooldown.as_millis() as u64,
            "Rate limit circuit breaker open, cooling down"
        );

        if let Some(tx) = &self.notify {
            let _ = tx
                .send(ProgressMessage::RateLimitCooldown {
                    worker: self.worker,
                    cooldown_ms: cooldown.as_millis() as u64,
                })
                .await;
        }

        tokio::time::sleep(cooldown).await;
        self.consecutive_hits = 0;
    }

    /// Exponential backoff with jitter: min(cap, 2^attempt * base + jitter)
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .config
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16));
        let jitter = if self.config.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..self.config.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(exponential.saturating_add(jitter).min(self.config.max_delay_ms))
    }

    /// Random cooldown window duration
    fn cooldown_duration(&self) -> Duration {
        let ms =
            rand::thread_rng().gen_range(self.config.cooldown_min_ms..=self.config.cooldown_max_ms);
        Duration::from_millis(ms)
    }
}
