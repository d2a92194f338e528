use crate::bug::{Bug, BugId, TaskStatus};

/// Read-only view of a master bug.
///
/// Derivative bugs only ever read their master's task statuses; they never
/// write to it.
pub trait MasterBugView: Send + Sync {
    fn id(&self) -> BugId;

    fn task_status(&self, name: &str) -> Option<TaskStatus>;
}

impl MasterBugView for Bug {
    fn id(&self) -> BugId {
        self.id
    }

    fn task_status(&self, name: &str) -> Option<TaskStatus> {
        Bug::task_status(self, name)
    }
}
