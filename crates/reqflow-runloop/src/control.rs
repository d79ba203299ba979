//! Control-command handling shared by the submitter and poller.

use tracing::{info, warn};

use reqflow_queue::{ControlCommand, PriorityQueue, QueueError};

use crate::state::{LoopAction, RunState};

/// Apply a control command to the loop state.
///
/// `CLR_QUEUES` empties every queue in `clear_targets` before the batch is
/// abandoned. Data-pull tokens leave the state untouched; resolving them is
/// up to the caller.
pub async fn apply_command(
    state: RunState,
    command: &ControlCommand,
    clear_targets: &[PriorityQueue],
) -> Result<(RunState, LoopAction), QueueError> {
    let (next, action) = state.on_command(command);
    match command {
        ControlCommand::ClearQueues if !state.is_terminal() => {
            for queue in clear_targets {
                let removed = queue.clear().await?;
                info!("CLR_QUEUES dropped {} entries from {}", removed, queue.target());
            }
        }
        ControlCommand::DataPull(_) => {}
        _ if next != state => info!("Command {} moved loop {} -> {}", command, state, next),
        _ => warn!("Command {} ignored in state {}", command, state),
    }
    Ok((next, action))
}
