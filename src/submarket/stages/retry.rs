// SPDX-License-Identifier: MIT

//! Bounded immediate retry for the LLM stages

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::adk::error::{ReportError, StageExhaustedError};
use crate::submarket::graph::Node;
use crate::submarket::state::{ReportState, StateUpdate};

/// Retry budget: the first attempt plus `max_retries` more, no backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

/// Result of running an operation under a `RetryPolicy`
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted(StageExhaustedError),
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Succeeded { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Succeeded { attempts, .. } => *attempts,
            RetryOutcome::Exhausted(e) => e.attempts,
        }
    }

    pub fn into_result(self) -> Result<T, ReportError> {
        match self {
            RetryOutcome::Succeeded { value, .. } => Ok(value),
            RetryOutcome::Exhausted(e) => Err(e.into()),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Run `operation` (given the 1-based attempt number) until it succeeds
    /// or the budget is spent. The last error is kept as the cause.
    pub async fn execute<T, F, Fut>(&self, stage: &str, mut operation: F) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ReportError>>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("[{}] Succeeded on attempt {}", stage, attempt);
                    }
                    return RetryOutcome::Succeeded {
                        value,
                        attempts: attempt,
                    };
                }
                Err(e) if attempt < max_attempts => {
                    log::warn!(
                        "[{}] Retry {}/{} failed: {}",
                        stage,
                        attempt,
                        self.max_retries,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("[{}] Exceeded max retries: {}", stage, e);
                    return RetryOutcome::Exhausted(StageExhaustedError {
                        stage: stage.to_string(),
                        attempts: attempt,
                        last_error: Box::new(e),
                    });
                }
            }
        }
    }
}

/// Runs the wrapped node under a retry policy.
///
/// Every attempt sees the same snapshot, so retries are independent.
pub struct RetryingNode {
    stage: String,
    inner: Arc<dyn Node>,
    policy: RetryPolicy,
}

impl RetryingNode {
    pub fn new(stage: impl Into<String>, inner: Arc<dyn Node>, policy: RetryPolicy) -> Self {
        Self {
            stage: stage.into(),
            inner,
            policy,
        }
    }
}

#[async_trait]
impl Node for RetryingNode {
    fn writes(&self) -> &[&'static str] {
        self.inner.writes()
    }

    async fn run(&self, state: &ReportState) -> Result<StateUpdate, ReportError> {
        self.policy
            .execute(&self.stage, |_| self.inner.run(state))
            .await
            .into_result()
    }
}
