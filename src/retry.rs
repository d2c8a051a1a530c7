//! Bounded retry with exponential backoff for transient provider failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancellationToken;
use crate::error::{Result, RouteError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before retry number `retry` (1-based): `base * 2^(retry-1)`,
    /// capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
        let delay = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(delay)
    }

    fn delay_for(&self, retry: u32, err: &RouteError) -> Duration {
        let backoff = self.backoff(retry);
        match err {
            RouteError::RateLimited {
                retry_after: Some(hint),
            } => backoff.max(*hint).min(Duration::from_millis(self.max_delay_ms)),
            _ => backoff,
        }
    }

    /// Runs `op` until it succeeds, fails terminally, or attempts run out.
    /// Sleeps between attempts observe `cancel`.
    pub fn run<T>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut op: impl FnMut() -> Result<T>,
    ) -> Result<T> {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            cancel.check()?;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    let delay = self.delay_for(attempt, &err);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    cancel.sleep(delay)?;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
