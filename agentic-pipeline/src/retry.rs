//! Bounded retry around a single CLI invocation.
//!
//! The controller is synchronous apart from the sleep between
//! attempts; there is never more than one invocation in flight.

use crate::models::{AgentPromptRequest, AgentPromptResponse};
use agentic_pipeline_sdk::{log_agent_complete, log_agent_retry};
use async_trait::async_trait;
use std::time::Duration;

/// Default per-attempt delays, in seconds, for attempts 2, 3, 4
pub const DEFAULT_RETRY_DELAYS: [u64; 3] = [5, 30, 60];

/// Default maximum number of invocations per request
pub const DEFAULT_MAX_ATTEMPTS: usize = 3;

/// Environment override for the delay schedule, comma-separated
/// seconds. Used by tests and CI to avoid real sleeps.
pub const RETRY_DELAYS_ENV: &str = "AGENTIC_RETRY_DELAYS";

/// Delay schedule consulted after each failed attempt
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    delays: Vec<Duration>,
}

impl RetrySchedule {
    pub fn new(delays: Vec<Duration>) -> Self {
        Self { delays }
    }

    /// Schedule from `AGENTIC_RETRY_DELAYS` if set, else the default
    pub fn from_env() -> Self {
        if let Ok(raw) = std::env::var(RETRY_DELAYS_ENV) {
            let delays: Vec<Duration> = raw
                .split(',')
                .filter_map(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .collect();
            if !delays.is_empty() {
                return Self::new(delays);
            }
        }
        Self::default()
    }

    /// Delay after the `failures`-th failed attempt (1-based); the
    /// schedule is clamped to its last entry.
    pub fn delay_after(&self, failures: usize) -> Duration {
        if self.delays.is_empty() {
            return Duration::ZERO;
        }
        let idx = failures.saturating_sub(1).min(self.delays.len() - 1);
        self.delays[idx]
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self::new(
            DEFAULT_RETRY_DELAYS
                .iter()
                .map(|s| Duration::from_secs(*s))
                .collect(),
        )
    }
}

/// One fallible CLI invocation; implemented by the adapter and by test
/// stubs.
#[async_trait]
pub trait AgentInvoker: Send {
    async fn invoke(&mut self, request: &AgentPromptRequest) -> AgentPromptResponse;
}

/// Suspension point between attempts, injectable so tests count sleeps
/// without waiting.
#[async_trait]
pub trait Sleeper: Send {
    async fn sleep(&mut self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Wraps one invocation with bounded retries
#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: usize,
    schedule: RetrySchedule,
}

impl RetryController {
    pub fn new(max_attempts: usize, schedule: RetrySchedule) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            schedule,
        }
    }

    /// Controller with the default attempt count and the env-overridable
    /// delay schedule.
    pub fn from_env() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, RetrySchedule::from_env())
    }

    /// Invoke until success, a non-retryable failure, or attempts are
    /// exhausted. Returns the first successful response, or the last
    /// failed one.
    pub async fn run<I, S>(
        &self,
        invoker: &mut I,
        sleeper: &mut S,
        request: &AgentPromptRequest,
    ) -> AgentPromptResponse
    where
        I: AgentInvoker,
        S: Sleeper,
    {
        let mut last = None;
        for attempt in 1..=self.max_attempts {
            let response = invoker.invoke(request).await;
            if response.success {
                log_agent_complete!(request.run_id, request.agent_role, attempt);
                return response;
            }
            if !response.retry_code.is_retryable() || attempt == self.max_attempts {
                return response;
            }

            let delay = self.schedule.delay_after(attempt);
            log_agent_retry!(
                request.run_id,
                request.agent_role,
                attempt,
                delay.as_secs(),
                response.retry_code
            );
            last = Some(response);
            sleeper.sleep(delay).await;
        }
        // Loop always returns before falling through; keep the compiler
        // honest for max_attempts clamped to 1.
        last.unwrap_or_else(|| {
            AgentPromptResponse::failure(crate::models::RetryCode::ExecutionError, "")
        })
    }
}
