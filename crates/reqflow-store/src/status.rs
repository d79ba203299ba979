//! Request status model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Lifecycle status of a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Queued,
    Processing,
    Submitted,
    Completed,
    /// Permanent polling error.
    Error,
    /// Submission retry budget exhausted.
    Failed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Queued => "queued",
            RequestStatus::Processing => "processing",
            RequestStatus::Submitted => "submitted",
            RequestStatus::Completed => "completed",
            RequestStatus::Error => "error",
            RequestStatus::Failed => "failed",
        }
    }

    /// No further automatic transitions happen from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Error | RequestStatus::Failed
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "queued" => Ok(RequestStatus::Queued),
            "processing" => Ok(RequestStatus::Processing),
            "submitted" => Ok(RequestStatus::Submitted),
            "completed" => Ok(RequestStatus::Completed),
            "error" => Ok(RequestStatus::Error),
            "failed" => Ok(RequestStatus::Failed),
            other => Err(StoreError::InvalidStatus(other.to_string())),
        }
    }
}
