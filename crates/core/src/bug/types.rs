use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::{BugEvent, MonitorRecord};
use super::properties::BugProperties;
use super::status::TaskStatus;
use super::task::Task;
use crate::providers::{
    DebsProvider, MasterBugView, PolicyProvider, SnapProvider, TestResultsProvider,
};

/// Tracker-assigned bug number.
pub type BugId = u64;

/// Which artifacts a tracking bug follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Variant {
    /// Archive packages only.
    #[default]
    Debs,
    /// Archive packages plus a snap on the same bug.
    Combo,
    /// A snap following a master debs bug.
    SnapDebs,
}

/// Link from a derivative bug to the bug it is gated on.
///
/// `view` is `None` when the master could not be loaded; callers treat that
/// as "not yet knowable" rather than as an error.
#[derive(Clone)]
pub struct MasterLink {
    pub id: BugId,
    pub view: Option<Arc<dyn MasterBugView>>,
}

impl fmt::Debug for MasterLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterLink")
            .field("id", &self.id)
            .field("reachable", &self.view.is_some())
            .finish()
    }
}

/// A tracking bug: the tasks, tags and properties the engine reconciles,
/// plus the read-only providers it consults.
#[derive(Clone)]
pub struct Bug {
    pub id: BugId,
    pub series: String,
    pub source: String,
    pub version: Option<String>,
    pub variant: Variant,
    pub development_series: bool,
    pub cycle: Option<String>,
    pub tags: BTreeSet<String>,
    pub properties: BugProperties,
    pub tasks: BTreeMap<String, Task>,
    pub master: Option<MasterLink>,
    pub debs: Option<Arc<dyn DebsProvider>>,
    pub snap: Option<Arc<dyn SnapProvider>>,
    pub policy: Arc<dyn PolicyProvider>,
    pub test_results: Option<Arc<dyn TestResultsProvider>>,
    pub events: Vec<BugEvent>,
}

impl fmt::Debug for Bug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bug")
            .field("id", &self.id)
            .field("series", &self.series)
            .field("source", &self.source)
            .field("version", &self.version)
            .field("variant", &self.variant)
            .field("tags", &self.tags)
            .field("tasks", &self.tasks)
            .field("master", &self.master)
            .finish_non_exhaustive()
    }
}

impl Bug {
    pub fn new(
        id: BugId,
        series: impl Into<String>,
        source: impl Into<String>,
        policy: Arc<dyn PolicyProvider>,
    ) -> Self {
        Self {
            id,
            series: series.into(),
            source: source.into(),
            version: None,
            variant: Variant::Debs,
            development_series: false,
            cycle: None,
            tags: BTreeSet::new(),
            properties: BugProperties::default(),
            tasks: BTreeMap::new(),
            master: None,
            debs: None,
            snap: None,
            policy,
            test_results: None,
            events: Vec::new(),
        }
    }

    pub fn with_task(mut self, name: &str, status: TaskStatus) -> Self {
        self.tasks.insert(name.to_string(), Task::new(name, status));
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_debs(mut self, debs: Arc<dyn DebsProvider>) -> Self {
        self.debs = Some(debs);
        self
    }

    pub fn with_snap(mut self, snap: Arc<dyn SnapProvider>) -> Self {
        self.snap = Some(snap);
        self
    }

    pub fn with_test_results(mut self, feed: Arc<dyn TestResultsProvider>) -> Self {
        self.test_results = Some(feed);
        self
    }

    pub fn with_master(mut self, id: BugId, view: Option<Arc<dyn MasterBugView>>) -> Self {
        self.master = Some(MasterLink { id, view });
        self
    }

    // ========================================================================
    // Tasks and tags
    // ========================================================================

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn task_mut(&mut self, name: &str) -> Option<&mut Task> {
        self.tasks.get_mut(name)
    }

    pub fn task_status(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.get(name).map(|task| task.status)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn add_tag(&mut self, tag: &str) -> bool {
        self.tags.insert(tag.to_string())
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// First of `tags` present on the bug, if any.
    pub fn block_present(&self, tags: &[&str]) -> Option<String> {
        tags.iter()
            .find(|tag| self.tags.contains(**tag))
            .map(|tag| tag.to_string())
    }

    pub fn is_derivative(&self) -> bool {
        self.master.is_some()
    }

    /// Read-only view of the master bug, if this bug has one and it could be
    /// loaded.
    pub fn master(&self) -> Option<Arc<dyn MasterBugView>> {
        self.master.as_ref().and_then(|link| link.view.clone())
    }

    /// Status of a task on this bug, falling back to the master bug.
    pub fn task_status_or_master(&self, name: &str) -> Option<TaskStatus> {
        self.task_status(name)
            .or_else(|| self.master().and_then(|master| master.task_status(name)))
    }

    // ========================================================================
    // Phase
    // ========================================================================

    /// Set the phase label, stamping `phase_changed` only when the text
    /// actually changes.
    pub fn set_phase(&mut self, phase: &str, now: DateTime<Utc>) {
        if self.properties.phase.as_deref() == Some(phase) {
            return;
        }
        self.properties.phase = Some(phase.to_string());
        self.properties.phase_changed = Some(now);
    }

    // ========================================================================
    // Outbox
    // ========================================================================

    pub fn add_comment(&mut self, subject: &str, body: &str) {
        self.events.push(BugEvent::Comment {
            subject: subject.to_string(),
            body: body.to_string(),
        });
    }

    pub fn send_email(&mut self, subject: &str, body: &str, to: Option<&str>) {
        self.events.push(BugEvent::Email {
            subject: subject.to_string(),
            body: body.to_string(),
            to: to.map(str::to_string),
        });
    }

    /// Add a monitor record; duplicates are ignored.
    pub fn monitor_add(&mut self, record: MonitorRecord) {
        let event = BugEvent::Monitor { record };
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    /// Ask the scheduler to look at this bug again at `at`.
    pub fn refresh_at(&mut self, at: DateTime<Utc>, reason: &str) {
        let event = BugEvent::RefreshAt {
            at,
            reason: reason.to_string(),
        };
        if !self.events.contains(&event) {
            self.events.push(event);
        }
    }

    pub fn push_event(&mut self, event: BugEvent) {
        self.events.push(event);
    }

    /// Take every pending side effect, leaving the outbox empty.
    pub fn drain_events(&mut self) -> Vec<BugEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use chrono::TimeZone;

    #[test]
    fn test_monitor_add_deduplicates() {
        let mut bug = fixtures::sru_bug(1001);
        bug.monitor_add(MonitorRecord::TrackerModified { watch: 900 });
        bug.monitor_add(MonitorRecord::TrackerModified { watch: 900 });
        bug.monitor_add(MonitorRecord::TrackerModified { watch: 901 });
        assert_eq!(bug.events.len(), 2);
    }

    #[test]
    fn test_set_phase_only_stamps_on_change() {
        let mut bug = fixtures::sru_bug(1001);
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();

        bug.set_phase("Testing", first);
        bug.set_phase("Testing", later);
        assert_eq!(bug.properties.phase_changed, Some(first));

        bug.set_phase("Signoff", later);
        assert_eq!(bug.properties.phase.as_deref(), Some("Signoff"));
        assert_eq!(bug.properties.phase_changed, Some(later));
    }

    #[test]
    fn test_block_present_returns_first_match() {
        let bug = fixtures::sru_bug(1001).with_tag("kernel-block-updates");
        assert_eq!(
            bug.block_present(&["kernel-block", "kernel-block-updates"]),
            Some("kernel-block-updates".to_string())
        );
        assert_eq!(bug.block_present(&["kernel-block-proposed"]), None);
    }

    #[test]
    fn test_task_status_falls_back_to_master() {
        let master = fixtures::sru_bug(900).with_task("promote-to-security", TaskStatus::FixReleased);
        let bug = fixtures::snap_bug(1002).with_master(900, Some(Arc::new(master)));

        assert_eq!(
            bug.task_status_or_master("promote-to-security"),
            Some(TaskStatus::FixReleased)
        );
        assert_eq!(bug.task_status_or_master("no-such-task"), None);
    }

    #[test]
    fn test_drain_events_empties_outbox() {
        let mut bug = fixtures::sru_bug(1001);
        bug.add_comment("subject", "body");
        assert_eq!(bug.drain_events().len(), 1);
        assert!(bug.events.is_empty());
    }
}
