//! Loop lifecycle state machine.
//!
//! ```text
//! Initializing ──start──► Running ──PAUSE──► Paused ──RESUME──► Resuming ──start──► Running
//!                            │
//!                            └──EXIT──► CmdDie          any ──fault──► ErrorDie
//! ```
//!
//! The state is a plain value owned by the loop controller; every command
//! step takes the current state and returns the next one together with a
//! [`LoopAction`] for the rest of the batch.

use std::fmt;

use reqflow_queue::ControlCommand;

/// Control state of one loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RunState {
    #[default]
    Initializing,
    Running,
    Paused,
    /// Becomes `Running` at the top of the next iteration.
    Resuming,
    /// Stopped by an EXIT command or an interrupt.
    CmdDie,
    /// Stopped by an unrecoverable fault.
    ErrorDie,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Initializing => "INITIALIZING",
            RunState::Running => "RUNNING",
            RunState::Paused => "PAUSED",
            RunState::Resuming => "RESUMING",
            RunState::CmdDie => "CMD_DIE",
            RunState::ErrorDie => "ERROR_DIE",
        }
    }

    /// The loop exits once it reaches a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::CmdDie | RunState::ErrorDie)
    }

    pub fn is_paused(&self) -> bool {
        *self == RunState::Paused
    }

    /// Transition taken at the top of every iteration.
    pub fn start(self) -> RunState {
        match self {
            RunState::Initializing | RunState::Resuming => RunState::Running,
            other => other,
        }
    }

    /// Escalate to `ErrorDie`. Terminal states are kept.
    pub fn fail(self) -> RunState {
        if self.is_terminal() {
            self
        } else {
            RunState::ErrorDie
        }
    }

    /// Stop on interrupt. Terminal states are kept.
    pub fn interrupt(self) -> RunState {
        if self.is_terminal() {
            self
        } else {
            RunState::CmdDie
        }
    }

    /// Apply a control command.
    pub fn on_command(self, command: &ControlCommand) -> (RunState, LoopAction) {
        if self.is_terminal() {
            return (self, LoopAction::Stop);
        }
        match command {
            ControlCommand::Exit => (RunState::CmdDie, LoopAction::Stop),
            ControlCommand::Pause => (RunState::Paused, LoopAction::SkipRestOfBatch),
            ControlCommand::Resume => (RunState::Resuming, LoopAction::SkipRestOfBatch),
            ControlCommand::ClearQueues => (self, LoopAction::SkipRestOfBatch),
            ControlCommand::DataPull(_) => (self, LoopAction::Continue),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the loop does with the rest of the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Go on with the next entry.
    Continue,
    /// Leave the loop.
    Stop,
    /// Drop the rest of this batch and start a new iteration.
    SkipRestOfBatch,
}
