//! Tracking-bug data model: tasks, statuses, reasons, properties and the
//! outbox of side effects.

mod events;
mod properties;
mod reason;
mod status;
mod task;
mod types;

pub use events::{BugEvent, MonitorRecord};
pub use properties::BugProperties;
pub use reason::{Reason, ReasonState};
pub use status::{ParseTaskStatusError, TaskStatus};
pub use task::Task;
pub use types::{Bug, BugId, MasterLink, Variant};
