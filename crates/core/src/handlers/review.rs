use chrono::Duration;
use tracing::info;

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{Reason, ReasonState, TaskStatus};
use crate::providers::Pocket;

/// `sru-review` / `new-review`: a human looks at the prepared sources.
///
/// The review is clamped to the preparation it was opened for; a re-spin
/// (new prepare id) rescinds it.
pub struct SourceReview;

impl SourceReview {
    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let prepared = ctx.task_status(":prepare-packages");
        if !matches!(
            prepared,
            Some(TaskStatus::FixCommitted) | Some(TaskStatus::FixReleased)
        ) {
            ctx.set_reason(Reason::holding("waiting for packages to be prepared"));
            return Ok(ctx.outcome());
        }

        let debs = ctx.debs()?;
        let next = if debs.has_route(Pocket::Signing) {
            Pocket::Signing
        } else {
            Pocket::Proposed
        };
        let delta = debs.delta(Pocket::Ppa, next);
        let task = ctx.task_name().to_string();
        ctx.bug.properties.delta.insert(task.clone(), delta);
        // Without a prepare id there is nothing to clamp to; a stale clamp
        // would rescind the review on the next pass.
        match debs.prepare_id() {
            Some(id) => ctx.bug.properties.clamp_assign(&task, id),
            None => {
                ctx.bug.properties.clamp_remove(&task);
            }
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        Ok(ctx.outcome())
    }

    /// Back to New when the preparation under review has been replaced.
    fn rescind(&self, ctx: &mut TaskContext<'_>) -> Result<bool, TaskError> {
        let current = ctx.debs()?.prepare_id();
        let Some(clamp) = ctx.bug.properties.clamp(ctx.task_name()) else {
            return Ok(false);
        };
        if current.as_deref() == Some(clamp) {
            return Ok(false);
        }

        info!(
            "Bug {} {}: prepare id changed ({} -> {}), rescinding",
            ctx.bug.id,
            ctx.task_name(),
            clamp,
            current.as_deref().unwrap_or("none")
        );
        ctx.pull_back(Reason::holding("preparation changed, review rescinded"));
        Ok(true)
    }

    fn active(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if self.rescind(ctx)? {
            return Ok(ctx.outcome());
        }

        match ctx.status() {
            TaskStatus::Confirmed => {
                let state = ctx.reason_state(ReasonState::Pending, Duration::hours(12));
                ctx.set_reason(Reason::new(state, "ready for review"));
            }
            TaskStatus::InProgress | TaskStatus::FixCommitted => {
                let state = ctx.reason_state(ReasonState::Ongoing, Duration::hours(4));
                ctx.set_reason(Reason::new(state, "review in progress"));
            }
            TaskStatus::Incomplete => ctx.set_reason(Reason::stalled("review FAILED")),
            _ => {}
        }
        Ok(ctx.outcome())
    }
}

impl TaskHandler for SourceReview {
    fn name(&self) -> &'static str {
        "source-review"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New => self.new_task(ctx),
            TaskStatus::Confirmed
            | TaskStatus::InProgress
            | TaskStatus::FixCommitted
            | TaskStatus::Incomplete => self.active(ctx),
            TaskStatus::FixReleased => {
                self.rescind(ctx)?;
                Ok(ctx.outcome())
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}
