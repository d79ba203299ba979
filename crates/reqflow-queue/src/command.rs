//! Control-command vocabulary.

use std::fmt;
use std::str::FromStr;

/// A command token carried by a `COMMAND` record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlCommand {
    /// Stop the consuming loop.
    Exit,
    /// Stop processing data requests until resumed.
    Pause,
    /// Leave the paused state.
    Resume,
    /// Empty the consuming loop's queue.
    ClearQueues,
    /// Caller-defined data-pull token, resolved by a request builder.
    DataPull(String),
}

impl ControlCommand {
    pub const EXIT: &'static str = "EXIT";
    pub const PAUSE: &'static str = "PAUSE";
    pub const RESUME: &'static str = "RESUME";
    pub const CLR_QUEUES: &'static str = "CLR_QUEUES";

    /// Parse a token. Matching is case-insensitive and ignores surrounding whitespace.
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_uppercase();
        match token.as_str() {
            Self::EXIT => ControlCommand::Exit,
            Self::PAUSE => ControlCommand::Pause,
            Self::RESUME => ControlCommand::Resume,
            Self::CLR_QUEUES | "CLEAR_QUEUES" => ControlCommand::ClearQueues,
            _ => ControlCommand::DataPull(token),
        }
    }

    /// The canonical wire token.
    pub fn token(&self) -> &str {
        match self {
            ControlCommand::Exit => Self::EXIT,
            ControlCommand::Pause => Self::PAUSE,
            ControlCommand::Resume => Self::RESUME,
            ControlCommand::ClearQueues => Self::CLR_QUEUES,
            ControlCommand::DataPull(token) => token,
        }
    }

    /// Whether this command steers the loop rather than requesting data.
    pub fn is_control(&self) -> bool {
        !matches!(self, ControlCommand::DataPull(_))
    }
}

impl FromStr for ControlCommand {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}
