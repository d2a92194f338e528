//! Mock test-results feed for testing.

use std::sync::{Arc, RwLock};

use crate::providers::{FeedError, StaticResults, TestQuery, TestResultsProvider};

/// Mock implementation of [`TestResultsProvider`] that also records every
/// query it answers.
#[derive(Debug, Clone, Default)]
pub struct MockTestResults {
    results: Arc<RwLock<StaticResults>>,
    queries: Arc<RwLock<Vec<TestQuery>>>,
}

impl MockTestResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&self, task: &str, result: &str) {
        self.results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .results
            .insert(task.to_string(), result.to_string());
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.results
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .unreachable = unreachable;
    }

    pub fn recorded_queries(&self) -> Vec<TestQuery> {
        self.queries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TestResultsProvider for MockTestResults {
    fn lookup(&self, query: &TestQuery) -> Result<Option<String>, FeedError> {
        self.queries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.clone());
        self.results
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .lookup(query)
    }
}
