//! Types for the workflow engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bug::{BugId, TaskStatus};

/// Errors that stop a whole bug from being cranked.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Strict dispatch found a task in a status its handler does not handle.
    #[error("bug {bug}: {task} has no handling for status {status}")]
    UnmappedStatus {
        bug: BugId,
        task: String,
        status: TaskStatus,
    },
}

/// One status change applied during a crank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub task: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
    /// 1-based pass in which the change happened.
    pub pass: u32,
}

/// A handler error that was absorbed by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
    /// Task state was left untouched and a re-poll scheduled.
    pub retryable: bool,
}

/// Result of cranking one bug.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrankOutcome {
    pub bug: BugId,
    pub passes: u32,
    pub transitions: Vec<TransitionRecord>,
    pub failures: Vec<TaskFailure>,
}

impl CrankOutcome {
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// Final status of `task` if it moved during the crank.
    pub fn last_status(&self, task: &str) -> Option<TaskStatus> {
        self.transitions
            .iter()
            .rev()
            .find(|record| record.task == task)
            .map(|record| record.to)
    }
}
