// SPDX-License-Identifier: MIT

//! Retry policy for transient Model Client failures
//!
//! The graph executor never retries on its own. Callers who want retries
//! wrap their client in [`RetryingClient`], which retries only errors for
//! which [`ModelError::is_transient`] holds and gives up after
//! `max_attempts`, surfacing the last error unchanged.

use super::{Message, ModelClient};
use crate::adk::error::ModelError;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: usize,
    /// Delay before the first retry
    pub initial_interval: Duration,
    /// Multiplier applied after each retry
    pub backoff_factor: f64,
    /// Upper bound for any single delay
    pub max_interval: Duration,
    /// Scale each delay by a random factor in 0.5..=1.5
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_interval: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_interval: Duration::from_secs(30),
            jitter: true,
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay to wait after the given (0-indexed) failed attempt
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = base.min(self.max_interval.as_secs_f64());
        let secs = if self.jitter {
            capped * rand::thread_rng().gen_range(0.5..=1.5)
        } else {
            capped
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Model Client wrapper that retries transient failures
pub struct RetryingClient<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: ModelClient> RetryingClient<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<M: ModelClient> ModelClient for RetryingClient<M> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(&self, conversation: &[Message]) -> Result<Message, ModelError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(conversation).await {
                Ok(message) => return Ok(message),
                Err(e) if e.is_transient() && attempt + 1 < self.policy.max_attempts => {
                    let mut delay = self.policy.delay_for(attempt);
                    if let ModelError::RateLimited {
                        retry_after_secs: Some(secs),
                    } = &e
                    {
                        delay = delay.max(Duration::from_secs(*secs));
                    }
                    log::warn!(
                        "Model {} attempt {}/{} failed: {}; retrying in {:?}",
                        self.inner.name(),
                        attempt + 1,
                        self.policy.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
