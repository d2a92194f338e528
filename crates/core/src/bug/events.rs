//! Outbox of side effects the engine asks the bug tracker to deliver.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::TaskStatus;
use super::BugId;
use crate::providers::Pocket;

/// Something the adapter should watch so the scheduler re-polls the bug
/// when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MonitorRecord {
    /// Another tracking bug whose progress we are waiting on.
    TrackerModified { watch: BugId },
    /// A task on this bug changed by an external service.
    TaskStatus { task: String, status: TaskStatus },
    /// Build or publication activity in an archive pocket.
    Pocket { pocket: Pocket },
    /// A snap-store channel.
    SnapChannel { risk: String },
}

/// A side effect produced during a crank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BugEvent {
    Comment {
        subject: String,
        body: String,
    },
    Email {
        subject: String,
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
    },
    Monitor {
        record: MonitorRecord,
    },
    RefreshAt {
        at: DateTime<Utc>,
        reason: String,
    },
    TestingRequested {
        task: String,
        pocket: Pocket,
    },
    CopyRequested {
        task: String,
        source: Pocket,
        destination: Pocket,
    },
}
