//! Task status enumeration shared by every workflow task.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a single workflow task.
///
/// The variants mirror the fixed status set of the external tracker; the
/// serialized form is the tracker's own spelling ("Fix Released",
/// "Won't Fix", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "New")]
    New,
    #[serde(rename = "Incomplete")]
    Incomplete,
    /// Used by the testing stages to mean "aborted".
    #[serde(rename = "Opinion")]
    Opinion,
    #[serde(rename = "Invalid")]
    Invalid,
    #[serde(rename = "Won't Fix")]
    WontFix,
    #[serde(rename = "Expired")]
    Expired,
    #[serde(rename = "Confirmed")]
    Confirmed,
    #[serde(rename = "Triaged")]
    Triaged,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Fix Committed")]
    FixCommitted,
    #[serde(rename = "Fix Released")]
    FixReleased,
    #[serde(rename = "Unknown")]
    Unknown,
}

/// Error returned when a status string is not part of the tracker's set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown task status: {0}")]
pub struct ParseTaskStatusError(pub String);

impl TaskStatus {
    pub const ALL: [TaskStatus; 12] = [
        TaskStatus::New,
        TaskStatus::Incomplete,
        TaskStatus::Opinion,
        TaskStatus::Invalid,
        TaskStatus::WontFix,
        TaskStatus::Expired,
        TaskStatus::Confirmed,
        TaskStatus::Triaged,
        TaskStatus::InProgress,
        TaskStatus::FixCommitted,
        TaskStatus::FixReleased,
        TaskStatus::Unknown,
    ];

    /// Returns the tracker spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::New => "New",
            TaskStatus::Incomplete => "Incomplete",
            TaskStatus::Opinion => "Opinion",
            TaskStatus::Invalid => "Invalid",
            TaskStatus::WontFix => "Won't Fix",
            TaskStatus::Expired => "Expired",
            TaskStatus::Confirmed => "Confirmed",
            TaskStatus::Triaged => "Triaged",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::FixCommitted => "Fix Committed",
            TaskStatus::FixReleased => "Fix Released",
            TaskStatus::Unknown => "Unknown",
        }
    }

    /// `Fix Released` and `Invalid` end a task's life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::FixReleased | TaskStatus::Invalid)
    }

    /// Terminal for the purpose of gating a promotion on testing: an explicit
    /// "won't fix" counts as done.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            TaskStatus::FixReleased | TaskStatus::Invalid | TaskStatus::WontFix
        )
    }

    /// The task is being worked (past New, not finished, not failed).
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Confirmed
                | TaskStatus::Triaged
                | TaskStatus::InProgress
                | TaskStatus::FixCommitted
        )
    }

    /// The stage has been started by someone: anything past New/Confirmed.
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            TaskStatus::Triaged
                | TaskStatus::InProgress
                | TaskStatus::FixCommitted
                | TaskStatus::FixReleased
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskStatus {
    type Error = ParseTaskStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ParseTaskStatusError(value.to_string()))
    }
}
