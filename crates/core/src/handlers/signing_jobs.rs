use tracing::info;

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{MonitorRecord, Reason, TaskStatus};

/// Signing requests raised against the new-review approval.
///
/// The task is moved to Triaged externally when signing is wanted; from
/// there it tracks `new-review` and `promote-to-proposed`.
pub struct CanonicalSigningJobs;

impl CanonicalSigningJobs {
    fn ready(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let review = ctx.require_task("new-review")?;
        if !matches!(
            review,
            TaskStatus::InProgress | TaskStatus::FixCommitted | TaskStatus::FixReleased
        ) {
            info!(
                "Bug {} new-review is {}, rescinding signing",
                ctx.bug.id, review
            );
            ctx.pull_back(Reason::holding("new-review not approved"));
            return Ok(ctx.outcome());
        }
        if review != TaskStatus::FixReleased {
            ctx.set_reason(Reason::holding("waiting for new-review approval"));
            return Ok(ctx.outcome());
        }

        match ctx.require_task("promote-to-proposed")? {
            TaskStatus::Invalid => {
                info!(
                    "Bug {} promote-to-proposed is Invalid, failing signing",
                    ctx.bug.id
                );
                ctx.set_status(TaskStatus::Incomplete);
            }
            TaskStatus::New | TaskStatus::Triaged => {
                ctx.set_reason(Reason::pending("waiting for promote-to-proposed"));
            }
            _ => {
                ctx.set_status(TaskStatus::Confirmed);
                ctx.timestamp("started");
            }
        }
        Ok(ctx.outcome())
    }

    fn monitor(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if ctx.task_status("new-review") != Some(TaskStatus::FixReleased) {
            info!("Bug {} new-review no longer approved, rescinding", ctx.bug.id);
            ctx.set_status(TaskStatus::Incomplete);
            return Ok(ctx.outcome());
        }

        ctx.set_reason(Reason::ongoing("signing request in-progress"));
        let task = ctx.task_name().to_string();
        let status = ctx.status();
        ctx.bug
            .monitor_add(MonitorRecord::TaskStatus { task, status });
        Ok(ctx.outcome())
    }
}

impl TaskHandler for CanonicalSigningJobs {
    fn name(&self) -> &'static str {
        "canonical-signing-jobs"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::Triaged => self.ready(ctx),
            TaskStatus::InProgress | TaskStatus::FixCommitted => self.monitor(ctx),
            TaskStatus::Incomplete => {
                ctx.set_reason(Reason::stalled("signing request failed/rescinded"));
                Ok(ctx.outcome())
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}
