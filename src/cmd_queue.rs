//! Producer-side queue commands: send, request and clear.

use tracing::info;

use reqflow_config::Config;
use reqflow_queue::{
    ControlCommand, DEFAULT_REQUEST_PRIORITY, DataRequestSpec, HIGH_CMD_PRIORITY,
    LAST_CMD_PRIORITY, PriorityQueue,
};

use crate::backends::{open_lifecycle_store, open_request_queue};
use crate::cli::{ClearTarget, SendTarget};

type BoxError = Box<dyn std::error::Error>;

/// Priority a command is sent with when none is given explicitly.
fn command_priority(priority: Option<i64>, last: bool) -> i64 {
    match (priority, last) {
        (_, true) => LAST_CMD_PRIORITY,
        (Some(priority), false) => priority,
        (None, false) => HIGH_CMD_PRIORITY,
    }
}

fn clear_targets(config: &Config, target: ClearTarget) -> Vec<String> {
    let queue = &config.queue;
    match target {
        ClearTarget::Request => vec![queue.request_queue.clone()],
        ClearTarget::Command => vec![queue.command_queue.clone()],
        ClearTarget::Response => vec![queue.response_queue.clone()],
        ClearTarget::Error => vec![queue.error_queue.clone()],
        ClearTarget::All => queue.names().iter().map(|name| name.to_string()).collect(),
    }
}

pub(crate) async fn send(
    config: Config,
    token: &str,
    target: SendTarget,
    priority: Option<i64>,
    last: bool,
) -> Result<(), BoxError> {
    let command = ControlCommand::parse(token);
    if command.token().is_empty() {
        return Err("command token is empty".into());
    }

    let queue = open_request_queue(&config.queue).await?;
    let queue = match target {
        SendTarget::Request => queue,
        SendTarget::Command => queue.with_target(config.queue.command_queue.clone()),
    };
    let priority = command_priority(priority, last);

    queue.enqueue_command(&command, priority).await?;
    info!("Sent {} to {} with priority {}", command, queue.target(), priority);
    println!("Sent {} to {} (priority {})", command, queue.target(), priority);

    queue.close().await?;
    Ok(())
}

pub(crate) async fn request(
    config: Config,
    spec: DataRequestSpec,
) -> Result<(), BoxError> {
    let queue = open_request_queue(&config.queue).await?;
    let store = open_lifecycle_store(&config.store).await?;
    let record = spec.into_record();
    queue.enqueue(&record).await?;
    let tracked = store.track(&record).await;
    store.close().await?;
    queue.close().await?;
    tracked?;
    info!(
        "Enqueued {} ({}) with priority {}",
        record.request_id, record.identifier, record.priority
    );
    println!("Enqueued request {}", record.request_id);
    println!("  identifier: {}", record.identifier);
    println!("  priority:   {}", record.priority);
    Ok(())
}

/// Build the spec for `request` from CLI arguments and the configured retry budget.
#[allow(clippy::too_many_arguments)]
pub(crate) fn request_spec(
    config: &Config,
    name: String,
    title: String,
    identifier_type: String,
    identifiers: Vec<String>,
    fields: Vec<String>,
    format: String,
    priority: Option<i64>,
) -> DataRequestSpec {
    DataRequestSpec::new(name, title)
        .with_identifiers(identifier_type, identifiers)
        .with_fields(fields)
        .with_output_format(format)
        .with_priority(priority.unwrap_or(DEFAULT_REQUEST_PRIORITY))
        .with_max_retries(config.retry.max_retries)
}

pub(crate) async fn clear(config: Config, target: ClearTarget) -> Result<(), BoxError> {
    let queue = open_request_queue(&config.queue).await?;
    for name in clear_targets(&config, target) {
        let handle: PriorityQueue = queue.with_target(name);
        let removed = handle.clear().await?;
        info!("Cleared {} entries from {}", removed, handle.target());
        println!("{}: {} removed", handle.target(), removed);
    }
    queue.close().await?;
    Ok(())
}
