//! External test-results feed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bug::TaskStatus;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("test results feed unreachable: {0}")]
    Unreachable(String),

    #[error("malformed test result for {task}: {detail}")]
    Malformed { task: String, detail: String },
}

/// What a testing task asks the feed about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestQuery {
    pub task: String,
    pub series: String,
    pub source: String,
    pub version: Option<String>,
}

pub trait TestResultsProvider: Send + Sync {
    /// Latest raw result for the query, or `None` when nothing has been
    /// reported yet.
    fn lookup(&self, query: &TestQuery) -> Result<Option<String>, FeedError>;
}

/// Map a raw feed result onto a task status.
pub fn feed_status(result: &str) -> TaskStatus {
    match result.trim().to_ascii_lowercase().as_str() {
        "passed" | "hinted" => TaskStatus::FixReleased,
        "failed" | "noprov" => TaskStatus::Incomplete,
        _ => TaskStatus::InProgress,
    }
}

/// Results captured in a snapshot, keyed by task name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StaticResults {
    pub results: BTreeMap<String, String>,
    /// Simulates an unreachable feed.
    pub unreachable: bool,
}

impl TestResultsProvider for StaticResults {
    fn lookup(&self, query: &TestQuery) -> Result<Option<String>, FeedError> {
        if self.unreachable {
            return Err(FeedError::Unreachable("feed marked unreachable".to_string()));
        }
        match self.results.get(&query.task) {
            Some(result) if result.trim().is_empty() => Err(FeedError::Malformed {
                task: query.task.clone(),
                detail: "empty result".to_string(),
            }),
            Some(result) => Ok(Some(result.clone())),
            None => Ok(None),
        }
    }
}
