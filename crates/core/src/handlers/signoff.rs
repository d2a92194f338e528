use chrono::Duration;
use tracing::info;

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{Reason, ReasonState, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignoffGate {
    /// Packages are in -proposed and can be looked at.
    ReadyForTesting,
    /// Packaging has finished.
    Prepared,
}

/// Human approval gate. Never decides on its own: it only opens the task
/// for review and, for derivatives, copies the master's decision down.
pub struct Signoff {
    gate: SignoffGate,
    mirror_master: bool,
}

impl Signoff {
    pub fn security() -> Self {
        Self {
            gate: SignoffGate::ReadyForTesting,
            mirror_master: true,
        }
    }

    pub fn stakeholder() -> Self {
        Self {
            gate: SignoffGate::ReadyForTesting,
            mirror_master: false,
        }
    }

    pub fn kernel() -> Self {
        Self {
            gate: SignoffGate::Prepared,
            mirror_master: false,
        }
    }

    fn gate_open(&self, ctx: &TaskContext<'_>) -> Result<bool, TaskError> {
        match self.gate {
            SignoffGate::ReadyForTesting => Ok(ctx.debs()?.ready_for_testing()),
            SignoffGate::Prepared => {
                Ok(ctx.task_status(":prepare-packages") == Some(TaskStatus::FixReleased))
            }
        }
    }

    /// Copy the master's decision once the master has started verifying.
    /// Returns true when this task is now following the master.
    fn mirror(&self, ctx: &mut TaskContext<'_>) -> bool {
        if !self.mirror_master {
            return false;
        }
        let Some(link) = ctx.bug.master.as_ref() else {
            return false;
        };
        let master_id = link.id;
        let Some(master) = link.view.clone() else {
            ctx.set_reason(Reason::holding(format!(
                "master bug {} not available",
                master_id
            )));
            return true;
        };

        let verifying = master
            .task_status("verification-testing")
            .is_none_or(|status| status.is_started());
        let Some(decision) = master.task_status(ctx.task_name()) else {
            return false;
        };
        if !verifying || decision == TaskStatus::New {
            return false;
        }

        if ctx.status() != decision {
            info!(
                "Bug {} {} following master bug {} ({})",
                ctx.bug.id,
                ctx.task_name(),
                master_id,
                decision
            );
            ctx.set_status(decision);
        }
        if decision.is_active() {
            ctx.set_reason(Reason::pending(format!(
                "waiting for signoff on master bug {}",
                master_id
            )));
        }
        true
    }

    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if !self.gate_open(ctx)? {
            ctx.set_reason(Reason::holding("not ready for signoff"));
            return Ok(ctx.outcome());
        }
        if self.mirror(ctx) {
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        Ok(ctx.outcome())
    }

    fn waiting(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if self.mirror(ctx) {
            return Ok(ctx.outcome());
        }
        let state = ctx.reason_state(ReasonState::Pending, Duration::hours(12));
        ctx.set_reason(Reason::new(state, "waiting for signoff"));
        Ok(ctx.outcome())
    }
}

impl TaskHandler for Signoff {
    fn name(&self) -> &'static str {
        "signoff"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New => self.new_task(ctx),
            TaskStatus::Confirmed | TaskStatus::InProgress | TaskStatus::FixCommitted => {
                self.waiting(ctx)
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}
