use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::TaskStatus;

/// Tasks that should not exist on a tracker any more.
pub struct IgnoreInvalid;

impl TaskHandler for IgnoreInvalid {
    fn name(&self) -> &'static str {
        "ignore-invalid"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New
            | TaskStatus::Confirmed
            | TaskStatus::Triaged
            | TaskStatus::InProgress
            | TaskStatus::Incomplete
            | TaskStatus::FixCommitted => {
                ctx.set_status(TaskStatus::Invalid);
                Ok(ctx.outcome())
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}
