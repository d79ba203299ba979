//! Submitter loop.
//!
//! Drains the inbound request queue, submits each data request to the
//! provider, and interleaves control commands. Entries are peeked, then
//! removed once the attempt reached a terminal outcome, so a crash in
//! between can resubmit a record (at-least-once).

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use reqflow_config::SubmitterConfig;
use reqflow_queue::{ControlCommand, PriorityQueue, QueueEntry, RequestRecord};
use reqflow_store::{LifecycleStore, RequestStatus};

use crate::backoff::{IdleBackoff, pause};
use crate::builder::{NoopRequestBuilder, RequestBuilder};
use crate::control::apply_command;
use crate::error::{RunLoopError, RunLoopResult};
use crate::provider::DataProvider;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::state::{LoopAction, RunState};

#[cfg(test)]
#[path = "submitter_tests.rs"]
mod tests;

/// Counters reported when the submitter exits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitterReport {
    pub final_state: RunState,
    pub iterations: u64,
    pub submitted: u64,
    pub retried: u64,
    pub failed: u64,
    pub commands: u64,
    pub dead_lettered: u64,
    /// Entries left at the head of the queue after a store failure.
    pub record_faults: u64,
    /// The error that escalated the loop to `ERROR_DIE`.
    pub fault: Option<String>,
}

/// The submitter loop and the resources it owns.
pub struct Submitter {
    queue: PriorityQueue,
    error_queue: Option<PriorityQueue>,
    store: Arc<dyn LifecycleStore>,
    provider: Arc<dyn DataProvider>,
    builder: Arc<dyn RequestBuilder>,
    retry: RetryPolicy,
    config: SubmitterConfig,
    shutdown: CancellationToken,
}

impl Submitter {
    pub fn new(
        queue: PriorityQueue,
        store: Arc<dyn LifecycleStore>,
        provider: Arc<dyn DataProvider>,
    ) -> Self {
        Self {
            queue,
            error_queue: None,
            store,
            provider,
            builder: Arc::new(NoopRequestBuilder),
            retry: RetryPolicy::default(),
            config: SubmitterConfig::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: SubmitterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolves data-pull command tokens.
    pub fn with_request_builder(mut self, builder: Arc<dyn RequestBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Undecodable entries and exhausted records are copied here before removal.
    pub fn with_error_queue(mut self, queue: PriorityQueue) -> Self {
        self.error_queue = Some(queue);
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Token that stops the loop at its next check.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until EXIT, interrupt, a fatal fault, or the loop bound.
    ///
    /// Queue, store and provider are released on every exit path.
    pub async fn run(self) -> SubmitterReport {
        let mut report = SubmitterReport::default();
        info!(
            "Submitter started on {} (batch size {})",
            self.queue.target(),
            self.config.batch_size
        );

        report.final_state = self.run_inner(&mut report).await;
        self.release().await;

        info!(
            "Submitter stopped in {}: {} iterations, {} submitted, {} retried, {} failed, {} commands",
            report.final_state,
            report.iterations,
            report.submitted,
            report.retried,
            report.failed,
            report.commands
        );
        report
    }

    async fn run_inner(&self, report: &mut SubmitterReport) -> RunState {
        let mut state = RunState::Initializing;
        let mut backoff = IdleBackoff::new(
            Duration::from_secs(self.config.min_wait_secs),
            Duration::from_secs(self.config.max_wait_secs),
        );

        loop {
            if self.shutdown.is_cancelled() {
                info!("Submitter interrupted");
                state = state.interrupt();
            }
            state = state.start();
            if state.is_terminal() {
                return state;
            }
            if self.config.max_loops >= 0 && report.iterations >= self.config.max_loops as u64 {
                info!("Submitter reached loop bound {}", self.config.max_loops);
                return state;
            }
            report.iterations += 1;

            match self.iteration(state, &mut backoff, report).await {
                Ok(next) => state = next,
                Err(e) if e.is_transient() => {
                    warn!("Submitter transient failure, backing off: {}", e);
                    pause(
                        Duration::from_secs(self.config.error_backoff_secs),
                        &self.shutdown,
                    )
                    .await;
                }
                Err(e) => {
                    error!("Submitter fault: {}", e);
                    report.fault = Some(e.to_string());
                    state = state.fail();
                }
            }
        }
    }

    /// One peek-process pass over the head of the queue.
    async fn iteration(
        &self,
        mut state: RunState,
        backoff: &mut IdleBackoff,
        report: &mut SubmitterReport,
    ) -> RunLoopResult<RunState> {
        let entries = self.queue.dequeue_batch(self.config.batch_size).await?;
        if entries.is_empty() {
            let sleep = backoff.next_sleep();
            debug!("Request queue empty, sleeping {:?}", sleep);
            pause(sleep, &self.shutdown).await;
            return Ok(state);
        }

        let mut faults = 0u64;
        for entry in &entries {
            let record = match entry.decode() {
                Ok(record) => record,
                Err(e) => {
                    warn!("Dropping undecodable entry: {}", e);
                    self.dead_letter(entry, report).await?;
                    self.queue.remove(&entry.member).await?;
                    continue;
                }
            };

            let command = record.command_token();
            let is_control = command.as_ref().is_some_and(ControlCommand::is_control);
            if state.is_paused() && !is_control {
                continue;
            }

            let action = match command {
                Some(command) if command.is_control() => {
                    report.commands += 1;
                    let (next, action) =
                        apply_command(state, &command, std::slice::from_ref(&self.queue)).await?;
                    self.queue.remove(&entry.member).await?;
                    state = next;
                    action
                }
                Some(ControlCommand::DataPull(token)) => {
                    report.commands += 1;
                    if let Err(e) = self.submit_data_pull(entry, &token, report).await {
                        warn!("Command {} left queued: {}", token, e);
                        faults += 1;
                    }
                    LoopAction::Continue
                }
                Some(_) => LoopAction::Continue,
                None => {
                    let identifier = record.identifier.clone();
                    if let Err(e) = self.submit(entry, record, report).await {
                        warn!("Request {} left queued: {}", identifier, e);
                        faults += 1;
                    }
                    LoopAction::Continue
                }
            };

            if action != LoopAction::Continue {
                debug!("Abandoning rest of batch: {:?}", action);
                break;
            }
            if self.shutdown.is_cancelled() {
                break;
            }
        }

        report.record_faults += faults;
        if state.is_paused() {
            let sleep = backoff.next_sleep();
            debug!("Submitter paused, sleeping {:?}", sleep);
            pause(sleep, &self.shutdown).await;
        } else if faults > 0 {
            // Failed entries stay at the head of the queue.
            pause(
                Duration::from_secs(self.config.error_backoff_secs),
                &self.shutdown,
            )
            .await;
        } else {
            backoff.reset();
        }
        Ok(state)
    }

    async fn submit_data_pull(
        &self,
        entry: &QueueEntry,
        token: &str,
        report: &mut SubmitterReport,
    ) -> RunLoopResult<()> {
        match self.builder.build(token) {
            Some(record) => {
                info!("Resolved {} to request {}", token, record.identifier);
                self.submit(entry, record, report).await
            }
            None => {
                warn!("Unknown command {}, removing it", token);
                self.queue.remove(&entry.member).await?;
                Ok(())
            }
        }
    }

    /// One submission attempt for `record`, acknowledging `entry` afterwards.
    async fn submit(
        &self,
        entry: &QueueEntry,
        record: RequestRecord,
        report: &mut SubmitterReport,
    ) -> RunLoopResult<()> {
        self.store.track(&record).await?;
        self.store
            .set_status(&record.request_id, RequestStatus::Processing)
            .await?;

        let failure = match self.provider.submit(&record.payload).await {
            Ok(reply) if reply.is_accepted() => {
                self.store
                    .set_status(&record.request_id, RequestStatus::Submitted)
                    .await?;
                self.queue.remove(&entry.member).await?;
                report.submitted += 1;
                info!(
                    "Submitted {} (attempt {})",
                    record.identifier,
                    record.retry_count + 1
                );
                return Ok(());
            }
            Ok(reply) => RunLoopError::ProviderRejected {
                status: reply.status,
                body: reply.body,
            },
            Err(e) => RunLoopError::Provider(e),
        };

        self.handle_failure(entry, record, failure, report).await
    }

    async fn handle_failure(
        &self,
        entry: &QueueEntry,
        record: RequestRecord,
        failure: RunLoopError,
        report: &mut SubmitterReport,
    ) -> RunLoopResult<()> {
        warn!(
            "Submission of {} failed (retry {}/{}): {}",
            record.identifier, record.retry_count, record.max_retries, failure
        );
        self.store
            .record_error(&record.request_id, &failure.to_string())
            .await?;

        match self.retry.decide(&record) {
            RetryDecision::Retry { record: next, delay } => {
                info!(
                    "Retrying {} in {:?} at priority {}",
                    next.identifier, delay, next.priority
                );
                pause(delay, &self.shutdown).await;
                self.queue.enqueue(&next).await?;
                self.store.track(&next).await?;
                self.store
                    .set_status(&next.request_id, RequestStatus::Queued)
                    .await?;
                self.queue.remove(&entry.member).await?;
                report.retried += 1;
            }
            RetryDecision::Exhausted => {
                error!(
                    "Request {} failed after {} retries",
                    record.identifier, record.retry_count
                );
                self.store
                    .set_status(&record.request_id, RequestStatus::Failed)
                    .await?;
                self.dead_letter(entry, report).await?;
                self.queue.remove(&entry.member).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    async fn dead_letter(&self, entry: &QueueEntry, report: &mut SubmitterReport) -> RunLoopResult<()> {
        if let Some(error_queue) = &self.error_queue {
            error_queue.enqueue_raw(&entry.member, entry.score).await?;
            report.dead_lettered += 1;
            debug!("Moved entry to {}", error_queue.target());
        }
        Ok(())
    }

    async fn release(&self) {
        if let Err(e) = self.queue.close().await {
            warn!("Failed to close request queue: {}", e);
        }
        if let Err(e) = self.store.close().await {
            warn!("Failed to close lifecycle store: {}", e);
        }
        if let Err(e) = self.provider.close().await {
            warn!("Failed to close provider: {}", e);
        }
    }
}
