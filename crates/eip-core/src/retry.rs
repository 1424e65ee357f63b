//! Bounded retry policy
//!
//! Retries live in the core, never in providers. A policy is a plain value:
//! maximum attempts plus a delay schedule. The same policy type drives
//! binding and the maintenance status waits.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay growth between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    /// The same delay before every retry
    #[default]
    Fixed,
    /// Doubling delay, capped at `max_delay_ms`
    Exponential {
        /// Upper bound for a single delay
        max_delay_ms: u64,
    },
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Delay before the first retry (in milliseconds)
    pub delay_ms: u64,

    /// How the delay grows on later retries
    #[serde(default)]
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed delay between `max_attempts` attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: duration_ms(delay),
            backoff: Backoff::Fixed,
        }
    }

    /// Doubling delay starting at `initial`, never exceeding `max`
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: duration_ms(initial),
            backoff: Backoff::Exponential {
                max_delay_ms: duration_ms(max),
            },
        }
    }

    /// A single attempt, no retries
    pub fn once() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Binding policy: 5 attempts, 1 second apart
    pub fn bind_default() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }

    /// Instance status wait: 10 attempts, 3 seconds apart
    pub fn status_wait_default() -> Self {
        Self::fixed(10, Duration::from_secs(3))
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => Duration::from_millis(self.delay_ms),
            Backoff::Exponential { max_delay_ms } => {
                let shift = attempt.saturating_sub(1).min(20);
                let grown = self.delay_ms.saturating_mul(1u64 << shift);
                Duration::from_millis(grown.min(max_delay_ms))
            }
        }
    }

    /// Every delay the policy would sleep if all attempts fail
    pub fn schedule(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_after(a)).collect()
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::config("Retry policy needs at least one attempt"));
        }
        if let Backoff::Exponential { max_delay_ms } = self.backoff
            && max_delay_ms < self.delay_ms
        {
            return Err(Error::config(format!(
                "Retry max delay ({}ms) is below the initial delay ({}ms)",
                max_delay_ms, self.delay_ms
            )));
        }
        Ok(())
    }

    /// Run `op` until it succeeds or the attempts are used up
    ///
    /// Sleeps between attempts, never after the last one. On exhaustion the
    /// final error is wrapped in [`Error::RetriesExhausted`].
    ///
    /// # Parameters
    ///
    /// - `operation`: Label for logs and the exhaustion error
    /// - `op`: One attempt; receives the 1-based attempt number
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    warn!(
                        "{}: attempt {}/{} failed, retrying in {:?}: {}",
                        operation, attempt, max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(Error::RetriesExhausted {
                        operation: operation.to_string(),
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::bind_default()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
