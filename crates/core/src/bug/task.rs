use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::reason::{Reason, ReasonState};
use super::status::TaskStatus;

/// One named workflow task on a tracking bug.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// When the task entered its current status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_since: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(name: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            name: name.into(),
            status,
            reason: None,
            assignee: None,
            status_since: None,
        }
    }

    /// Set the status, stamping `status_since` when it actually changes.
    /// Returns whether the status changed.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.status_since = Some(now);
        true
    }

    /// Age a reason state: once the task has sat in its status longer than
    /// `threshold` the preferred state is reported as `Stalled`.
    pub fn reason_state(
        &self,
        preferred: ReasonState,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> ReasonState {
        match self.status_since {
            Some(since) if now - since > threshold => ReasonState::Stalled,
            _ => preferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_set_status_stamps_since() {
        let mut task = Task::new("promote-to-updates", TaskStatus::New);
        assert!(task.set_status(TaskStatus::Confirmed, at(9)));
        assert_eq!(task.status_since, Some(at(9)));

        assert!(!task.set_status(TaskStatus::Confirmed, at(10)));
        assert_eq!(task.status_since, Some(at(9)));
    }

    #[test]
    fn test_reason_state_ages_to_stalled() {
        let mut task = Task::new("stakeholder-signoff", TaskStatus::New);
        task.set_status(TaskStatus::Confirmed, at(0));

        let fresh = task.reason_state(ReasonState::Pending, Duration::hours(12), at(6));
        assert_eq!(fresh, ReasonState::Pending);

        let stale = task.reason_state(ReasonState::Pending, Duration::hours(12), at(13));
        assert_eq!(stale, ReasonState::Stalled);
    }

    #[test]
    fn test_reason_state_without_history() {
        let task = Task::new("sru-review", TaskStatus::InProgress);
        let state = task.reason_state(ReasonState::Ongoing, Duration::hours(4), at(23));
        assert_eq!(state, ReasonState::Ongoing);
    }
}
