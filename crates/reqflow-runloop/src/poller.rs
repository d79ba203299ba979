//! Poller loop.
//!
//! Asks the provider about every `submitted` record, routes ready responses
//! through the [`HandlerRegistry`], and drains at most one command per
//! iteration so an EXIT can stop it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use reqflow_config::PollerConfig;
use reqflow_queue::{PriorityQueue, RequestRecord};
use reqflow_store::{LifecycleStore, RequestStatus};

use crate::backoff::pause;
use crate::control::apply_command;
use crate::error::{RunLoopError, RunLoopResult};
use crate::handler::{DispatchOutcome, HandlerRegistry, ResponsePayload};
use crate::provider::{DataProvider, PollResponse};
use crate::state::RunState;

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;

pub const NOT_FOUND_MESSAGE: &str = "Request not found";
pub const POLL_EXHAUSTED_MESSAGE: &str = "Polling attempts exhausted";

/// Counters reported when the poller exits.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollerReport {
    pub final_state: RunState,
    pub iterations: u64,
    pub polled: u64,
    pub completed: u64,
    pub errored: u64,
    pub dispatched: u64,
    pub handler_faults: u64,
    /// Records whose poll failed on a store error; the rest of the batch still ran.
    pub record_faults: u64,
    pub commands: u64,
    /// The error that escalated the loop to `ERROR_DIE`.
    pub fault: Option<String>,
}

/// The poller loop and the resources it owns.
pub struct Poller {
    store: Arc<dyn LifecycleStore>,
    provider: Arc<dyn DataProvider>,
    registry: HandlerRegistry,
    command_queue: Option<PriorityQueue>,
    config: PollerConfig,
    shutdown: CancellationToken,
}

impl Poller {
    /// A poller using the default CSV/JSON/error/raw handlers.
    pub fn new(store: Arc<dyn LifecycleStore>, provider: Arc<dyn DataProvider>) -> Self {
        let registry = HandlerRegistry::with_defaults(Arc::clone(&provider), Arc::clone(&store));
        Self {
            store,
            provider,
            registry,
            command_queue: None,
            config: PollerConfig::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: PollerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Access the registry to add or override handlers.
    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    pub fn with_command_queue(mut self, queue: PriorityQueue) -> Self {
        self.command_queue = Some(queue);
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run until EXIT, interrupt, a fatal fault, or run-to-completion finishes.
    pub async fn run(self) -> PollerReport {
        let mut report = PollerReport::default();
        info!(
            "Poller started (interval {}s, run to completion: {})",
            self.config.poll_interval_secs, self.config.run_to_completion
        );

        report.final_state = self.run_inner(&mut report).await;
        self.release().await;

        info!(
            "Poller stopped in {}: {} iterations, {} polled, {} completed, {} errored, {} dispatched",
            report.final_state,
            report.iterations,
            report.polled,
            report.completed,
            report.errored,
            report.dispatched
        );
        report
    }

    async fn run_inner(&self, report: &mut PollerReport) -> RunState {
        let interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut state = RunState::Initializing;

        loop {
            if self.shutdown.is_cancelled() {
                info!("Poller interrupted");
                state = state.interrupt();
            }
            state = state.start();
            if state.is_terminal() {
                return state;
            }
            report.iterations += 1;

            match self.iteration(state, report).await {
                Ok(next) => state = next,
                Err(e) if e.is_transient() => {
                    warn!("Poller transient failure, retrying next cycle: {}", e);
                }
                Err(e) => {
                    error!("Poller fault: {}", e);
                    report.fault = Some(e.to_string());
                    state = state.fail();
                }
            }
            if state.is_terminal() {
                return state;
            }

            if self.config.run_to_completion && !state.is_paused() {
                match self.store.list_by_status(RequestStatus::Submitted).await {
                    Ok(outstanding) if outstanding.is_empty() => {
                        info!("No submitted requests remain, poller finished");
                        return RunState::CmdDie;
                    }
                    Ok(outstanding) => debug!("{} requests outstanding", outstanding.len()),
                    Err(e) => warn!("Could not count outstanding requests: {}", e),
                }
            }

            pause(interval, &self.shutdown).await;
        }
    }

    async fn iteration(&self, state: RunState, report: &mut PollerReport) -> RunLoopResult<RunState> {
        if !state.is_paused() {
            let records = self.store.list_by_status(RequestStatus::Submitted).await?;
            debug!("Polling {} submitted requests", records.len());
            for record in &records {
                if self.shutdown.is_cancelled() {
                    break;
                }
                if let Err(e) = self.poll_record(record, report).await {
                    warn!("Poll of {} failed, continuing: {}", record.request_id, e);
                    report.record_faults += 1;
                }
            }
        }
        self.drain_command(state, report).await
    }

    async fn poll_record(
        &self,
        record: &RequestRecord,
        report: &mut PollerReport,
    ) -> RunLoopResult<()> {
        let id = &record.request_id;
        let attempts = self.store.record_poll(id).await?;

        let response = match self.provider.poll(&record.identifier).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Poll of {} failed, will retry: {}", record.identifier, e);
                return Ok(());
            }
        };
        report.polled += 1;

        match response.status {
            200 if response.items.is_empty() => {
                debug!("{} not ready (attempt {})", record.identifier, attempts);
            }
            200 => {
                self.store.set_status(id, RequestStatus::Completed).await?;
                report.completed += 1;
                info!(
                    "{} completed with {} responses",
                    record.identifier,
                    response.items.len()
                );
                self.dispatch(record, &response, report).await;
            }
            404 => {
                warn!("{}", RunLoopError::NotFound(record.identifier.clone()));
                self.mark_error(id, NOT_FOUND_MESSAGE, report).await?;
            }
            401 => {
                warn!("{} while polling {}", RunLoopError::AuthExpired, record.identifier);
                if let Err(e) = self.provider.refresh_auth().await {
                    error!("Token refresh failed: {}", e);
                }
            }
            status => {
                warn!(
                    "Poll of {} returned {}{}",
                    record.identifier,
                    status,
                    response
                        .message
                        .as_deref()
                        .map(|m| format!(": {}", m))
                        .unwrap_or_default()
                );
                let exhausted = self
                    .config
                    .max_poll_attempts
                    .is_some_and(|max| attempts >= max);
                if exhausted {
                    self.mark_error(id, POLL_EXHAUSTED_MESSAGE, report).await?;
                }
            }
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        record: &RequestRecord,
        response: &PollResponse,
        report: &mut PollerReport,
    ) {
        for item in &response.items {
            let mut payload = ResponsePayload::from_item(record, item, response.status);
            if let Some(message) = &response.message {
                payload = payload.with_error(message.clone());
            }
            match self.registry.dispatch(&payload).await {
                DispatchOutcome::Handled(_) => report.dispatched += 1,
                DispatchOutcome::Failed { .. } => report.handler_faults += 1,
                DispatchOutcome::Unmatched => {}
            }
        }
    }

    async fn mark_error(
        &self,
        request_id: &str,
        message: &str,
        report: &mut PollerReport,
    ) -> RunLoopResult<()> {
        self.store.set_status(request_id, RequestStatus::Error).await?;
        self.store.record_error(request_id, message).await?;
        report.errored += 1;
        Ok(())
    }

    /// Take at most one entry off the command queue.
    async fn drain_command(&self, state: RunState, report: &mut PollerReport) -> RunLoopResult<RunState> {
        let Some(queue) = &self.command_queue else {
            return Ok(state);
        };
        let Some(entry) = queue.dequeue_batch(1).await?.into_iter().next() else {
            return Ok(state);
        };

        let command = match entry.decode() {
            Ok(record) => record.command_token(),
            Err(e) => {
                warn!("Dropping undecodable command entry: {}", e);
                None
            }
        };
        let next = match command {
            Some(command) if command.is_control() => {
                report.commands += 1;
                let (next, _) = apply_command(state, &command, std::slice::from_ref(queue)).await?;
                next
            }
            Some(command) => {
                warn!("Poller ignores command {}", command);
                state
            }
            None => state,
        };
        queue.remove(&entry.member).await?;
        Ok(next)
    }

    async fn release(&self) {
        if let Some(queue) = &self.command_queue {
            if let Err(e) = queue.close().await {
                warn!("Failed to close command queue: {}", e);
            }
        }
        if let Err(e) = self.store.close().await {
            warn!("Failed to close lifecycle store: {}", e);
        }
        if let Err(e) = self.provider.close().await {
            warn!("Failed to close provider: {}", e);
        }
    }
}
