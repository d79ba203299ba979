//! Bounded retry policy for failed submissions.

use std::time::Duration;

use reqflow_config::{BackoffKind, RetryConfig};
use reqflow_queue::RequestRecord;

/// Outcome of a failed submission attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Re-enqueue `record` after sleeping `delay`.
    Retry { record: RequestRecord, delay: Duration },
    /// Budget spent; the record is failed.
    Exhausted,
}

/// Total attempts per record are `max_retries + 1`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    backoff: BackoffKind,
    priority_step: i64,
}

impl RetryPolicy {
    pub fn new(backoff: BackoffKind, priority_step: i64) -> Self {
        Self {
            backoff,
            priority_step,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.backoff, config.priority_step)
    }

    /// Sleep before retry number `retry_count`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let secs = match self.backoff {
            BackoffKind::Linear => 2u64.saturating_mul(u64::from(retry_count)),
            BackoffKind::Exponential => 2u64.saturating_pow(retry_count),
        };
        Duration::from_secs(secs)
    }

    /// Decide what happens to a record whose submission just failed.
    pub fn decide(&self, record: &RequestRecord) -> RetryDecision {
        if !record.can_retry() {
            return RetryDecision::Exhausted;
        }
        let mut next = record.clone();
        next.retry_count += 1;
        next.priority = next.priority.saturating_add(self.priority_step);
        RetryDecision::Retry {
            delay: self.delay_for(next.retry_count),
            record: next,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
