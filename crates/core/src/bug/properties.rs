//! Typed view of the small facts a tracking bug carries in its description.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-bug key/value facts.
///
/// Keys the engine does not know about are carried through untouched in
/// `extra` so other tooling can keep its own entries in the same block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BugProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_changed: Option<DateTime<Utc>>,

    /// task name -> event name -> when it happened
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timestamps: BTreeMap<String, BTreeMap<String, DateTime<Utc>>>,

    /// Artifact delta recorded when a task was confirmed, keyed by task name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub delta: BTreeMap<String, Vec<String>>,

    /// Values pinned by review tasks (e.g. the prepare id that was reviewed).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub clamps: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub announcements: BTreeSet<String>,

    /// Bug-level diagnostics not attached to a single task.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reasons: BTreeMap<String, String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl BugProperties {
    /// Record an event time for a task. The first recording wins; returns
    /// false if the event was already recorded.
    pub fn record_timestamp(&mut self, task: &str, event: &str, at: DateTime<Utc>) -> bool {
        let events = self.timestamps.entry(task.to_string()).or_default();
        if events.contains_key(event) {
            return false;
        }
        events.insert(event.to_string(), at);
        true
    }

    pub fn timestamp(&self, task: &str, event: &str) -> Option<DateTime<Utc>> {
        self.timestamps
            .get(task)
            .and_then(|events| events.get(event))
            .copied()
    }

    pub fn clamp(&self, key: &str) -> Option<&str> {
        self.clamps.get(key).map(String::as_str)
    }

    pub fn clamp_assign(&mut self, key: &str, value: impl Into<String>) {
        self.clamps.insert(key.to_string(), value.into());
    }

    pub fn clamp_remove(&mut self, key: &str) -> Option<String> {
        self.clamps.remove(key)
    }

    /// Mark an announcement as sent. Returns true only the first time.
    pub fn announce(&mut self, key: &str) -> bool {
        self.announcements.insert(key.to_string())
    }
}
