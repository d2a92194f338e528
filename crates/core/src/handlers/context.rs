use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::error::TaskError;
use super::Transition;
use crate::bug::{Bug, Reason, ReasonState, Task, TaskStatus};
use crate::config::EngineConfig;
use crate::providers::{DebsProvider, MasterBugView, PolicyProvider, SnapProvider};

/// Everything a handler may touch while evaluating one task.
///
/// All writes go through here so that status changes are logged and
/// reported back to the engine.
pub struct TaskContext<'a> {
    pub bug: &'a mut Bug,
    pub now: DateTime<Utc>,
    pub config: &'a EngineConfig,
    task: String,
    changed: bool,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        bug: &'a mut Bug,
        task: &str,
        now: DateTime<Utc>,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            bug,
            now,
            config,
            task: task.to_string(),
            changed: false,
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task
    }

    pub fn task(&self) -> Option<&Task> {
        self.bug.task(&self.task)
    }

    pub fn status(&self) -> TaskStatus {
        self.bug
            .task_status(&self.task)
            .unwrap_or(TaskStatus::Unknown)
    }

    /// Move the task along a handler-defined edge.
    pub fn set_status(&mut self, status: TaskStatus) {
        let bug_id = self.bug.id;
        let now = self.now;
        let Some(task) = self.bug.task_mut(&self.task) else {
            return;
        };
        let old = task.status;
        if task.set_status(status, now) {
            info!("Bug {} task {}: {} -> {}", bug_id, self.task, old, status);
            self.changed = true;
        }
    }

    /// Return an in-flight task to New because a readiness condition no
    /// longer holds.
    pub fn pull_back(&mut self, reason: Reason) {
        warn!(
            "Bug {} task {} pulled back from {}: {}",
            self.bug.id,
            self.task,
            self.status(),
            reason
        );
        self.set_status(TaskStatus::New);
        self.set_reason(reason);
    }

    pub fn set_reason(&mut self, reason: Reason) {
        if let Some(task) = self.bug.task_mut(&self.task) {
            task.reason = Some(reason);
        }
    }

    pub fn set_assignee(&mut self, assignee: Option<String>) {
        if let Some(task) = self.bug.task_mut(&self.task) {
            task.assignee = assignee;
        }
    }

    /// Record when this task hit `event` ("started", "finished").
    pub fn timestamp(&mut self, event: &str) {
        let now = self.now;
        self.bug
            .properties
            .record_timestamp(&self.task, event, now);
    }

    pub fn reason_state(&self, preferred: ReasonState, threshold: Duration) -> ReasonState {
        self.task()
            .map(|task| task.reason_state(preferred, threshold, self.now))
            .unwrap_or(preferred)
    }

    pub fn set_phase(&mut self, phase: &str) {
        let now = self.now;
        self.bug.set_phase(phase, now);
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn has_tag(&self, tag: &str) -> bool {
        self.bug.has_tag(tag)
    }

    pub fn task_status(&self, name: &str) -> Option<TaskStatus> {
        self.bug.task_status(name)
    }

    /// Status of a task this handler cannot work without.
    pub fn require_task(&self, name: &str) -> Result<TaskStatus, TaskError> {
        self.bug
            .task_status(name)
            .ok_or_else(|| TaskError::MissingTask {
                task: self.task.clone(),
                missing: name.to_string(),
            })
    }

    pub fn debs(&self) -> Result<Arc<dyn DebsProvider>, TaskError> {
        self.bug
            .debs
            .clone()
            .ok_or_else(|| TaskError::MissingProvider {
                task: self.task.clone(),
                provider: "debs",
            })
    }

    pub fn snap(&self) -> Result<Arc<dyn SnapProvider>, TaskError> {
        self.bug
            .snap
            .clone()
            .ok_or_else(|| TaskError::MissingProvider {
                task: self.task.clone(),
                provider: "snap",
            })
    }

    pub fn policy(&self) -> Arc<dyn PolicyProvider> {
        self.bug.policy.clone()
    }

    pub fn master(&self) -> Option<Arc<dyn MasterBugView>> {
        self.bug.master()
    }

    /// `Changed` if any status write took effect during this evaluation.
    pub fn outcome(&self) -> Transition {
        if self.changed {
            Transition::Changed
        } else {
            Transition::Unchanged
        }
    }
}
