//! Long-running loop commands.

use std::sync::Arc;

use tracing::{info, warn};

use reqflow_config::Config;
use reqflow_runloop::{
    CancellationToken, Poller, RetryPolicy, RunState, Submitter, TemplateRequestBuilder,
};

use crate::backends::{open_lifecycle_store, open_provider, open_request_queue};

type BoxError = Box<dyn std::error::Error>;

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping");
            token.cancel();
        }
    });
}

fn check_final_state(loop_name: &str, state: RunState, fault: Option<String>) -> Result<(), BoxError> {
    match state {
        RunState::ErrorDie => Err(format!(
            "{} stopped on error: {}",
            loop_name,
            fault.unwrap_or_else(|| "unknown fault".to_string())
        )
        .into()),
        _ => Ok(()),
    }
}

pub(crate) async fn run_submitter(config: Config) -> Result<(), BoxError> {
    let queue = open_request_queue(&config.queue).await?;
    let store = open_lifecycle_store(&config.store).await?;
    let provider = open_provider(&config)?;

    let builder = TemplateRequestBuilder::new(config.templates.clone(), config.retry.max_retries);
    info!("{} data-pull templates loaded", builder.len());

    let error_queue = queue.with_target(config.queue.error_queue.clone());
    let mut submitter = Submitter::new(queue, store, provider)
        .with_config(config.submitter.clone())
        .with_retry_policy(RetryPolicy::from_config(&config.retry))
        .with_request_builder(Arc::new(builder));
    if config.queue.dead_letter_enabled {
        submitter = submitter.with_error_queue(error_queue);
    }

    cancel_on_ctrl_c(submitter.shutdown_token());
    let report = submitter.run().await;
    check_final_state("Submitter", report.final_state, report.fault)
}

pub(crate) async fn run_poller(config: Config, run_to_completion: bool) -> Result<(), BoxError> {
    let queue = open_request_queue(&config.queue).await?;
    let store = open_lifecycle_store(&config.store).await?;
    let provider = open_provider(&config)?;

    let mut poller_config = config.poller.clone();
    poller_config.run_to_completion |= run_to_completion;
    if poller_config.max_poll_attempts.is_none() {
        warn!("poller.max_poll_attempts is unset; failing polls are retried indefinitely");
    }

    let poller = Poller::new(store, provider)
        .with_config(poller_config)
        .with_command_queue(queue.with_target(config.queue.command_queue.clone()));

    cancel_on_ctrl_c(poller.shutdown_token());
    let report = poller.run().await;
    check_final_state("Poller", report.final_state, report.fault)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_final_state() {
        assert!(check_final_state("Submitter", RunState::CmdDie, None).is_ok());
        let err = check_final_state("Poller", RunState::ErrorDie, Some("store gone".into()))
            .unwrap_err();
        assert!(err.to_string().contains("store gone"));
    }
}
