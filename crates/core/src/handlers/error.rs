use thiserror::Error;

use crate::providers::{CopyError, FeedError};

/// Escalating failures raised by a task handler.
///
/// "Not ready yet" is never an error; handlers express it with an unchanged
/// status and a reason.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("test results feed failed: {0}")]
    Feed(#[from] FeedError),

    #[error("{task} depends on missing task {missing}")]
    MissingTask { task: String, missing: String },

    #[error("{task} needs a {provider} provider but the bug has none")]
    MissingProvider {
        task: String,
        provider: &'static str,
    },

    #[error("copy request failed: {0}")]
    Copy(#[from] CopyError),
}

impl TaskError {
    /// The condition may clear on its own; re-poll later without touching
    /// task state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Feed(_))
    }

    /// The bug itself is set up wrong and needs a human.
    pub fn is_config_inconsistency(&self) -> bool {
        matches!(
            self,
            TaskError::MissingTask { .. } | TaskError::MissingProvider { .. }
        )
    }
}
