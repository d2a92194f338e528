//! Pseudo tasks (`:`-prefixed) that summarise several real ones.

use tracing::{debug, info};

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{BugEvent, MonitorRecord, Reason, ReasonState, TaskStatus};
use crate::providers::{failures_to_text, BuildState, DebsProvider, Pocket};

const SOURCE_BLOCK_TAGS: [&str; 2] = ["kernel-block-source", "kernel-block"];

// ============================================================================
// :prepare-packages
// ============================================================================

/// Aggregate of every `prepare-package*` task: done once all of them are
/// uploaded and everything has built in the ppa.
pub struct SynPreparePackages;

impl SynPreparePackages {
    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if let Some(tag) = ctx.bug.block_present(&SOURCE_BLOCK_TAGS) {
            ctx.set_reason(Reason::stalled(format!("blocked via {}", tag)));
            return Ok(ctx.outcome());
        }

        let debs = ctx.debs()?;
        if !debs.ready_to_prepare() {
            ctx.set_reason(Reason::holding("not ready to be cranked"));
            return Ok(ctx.outcome());
        }

        if let Some(older) = debs.older_tracker_in_pocket(Pocket::Ppa) {
            ctx.bug
                .monitor_add(MonitorRecord::TrackerModified { watch: older });
            ctx.set_reason(Reason::stalled(format!(
                "tracker for earlier spin {} still active in {}",
                older,
                Pocket::Ppa
            )));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        ctx.set_reason(Reason::pending("debs ready to be cranked"));
        Ok(ctx.outcome())
    }

    fn confirmed(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let started = prepare_tasks(ctx)
            .iter()
            .any(|(_, status)| status.is_started());
        if started {
            ctx.set_status(TaskStatus::InProgress);
        } else {
            ctx.set_reason(Reason::pending("debs ready to be cranked"));
        }
        Ok(ctx.outcome())
    }

    fn cranking(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let debs = ctx.debs()?;
        ctx.bug.monitor_add(MonitorRecord::Pocket { pocket: Pocket::Ppa });

        let tasks = prepare_tasks(ctx);
        let pending: Vec<&str> = tasks
            .iter()
            .filter(|(_, status)| !status.is_terminal())
            .map(|(name, _)| name.as_str())
            .collect();
        if !pending.is_empty() {
            let text = match ctx.task().and_then(|task| task.assignee.clone()) {
                Some(who) => format!("being cranked by: {}", who),
                None => format!("being cranked ({})", pending.join(", ")),
            };
            ctx.set_reason(Reason::ongoing(text));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::FixCommitted);

        if debs.all_built_in_pocket(Pocket::Ppa) {
            info!("Bug {} all packages built in ppa", ctx.bug.id);
            ctx.set_status(TaskStatus::FixReleased);
            ctx.timestamp("finished");
            return Ok(ctx.outcome());
        }

        ctx.set_reason(ppa_build_reason(debs.as_ref()));
        Ok(ctx.outcome())
    }
}

fn prepare_tasks(ctx: &TaskContext<'_>) -> Vec<(String, TaskStatus)> {
    ctx.bug
        .tasks
        .values()
        .filter(|task| task.name.starts_with("prepare-package"))
        .map(|task| (task.name.clone(), task.status))
        .collect()
}

fn ppa_build_reason(debs: &dyn DebsProvider) -> Reason {
    let failures = debs.build_failures(Pocket::Ppa);
    let state = if failures.iter().any(|f| f.state == BuildState::Failed) {
        ReasonState::Stalled
    } else if failures.iter().all(|f| f.state.is_transient()) {
        ReasonState::Ongoing
    } else {
        ReasonState::Pending
    };
    let what = if state == ReasonState::Stalled {
        "build FAILED"
    } else {
        "building"
    };
    let detail = if failures.is_empty() {
        "builds complete".to_string()
    } else {
        failures_to_text(&failures)
    };
    Reason::new(state, format!("{} in {} ({})", what, Pocket::Ppa, detail))
}

impl TaskHandler for SynPreparePackages {
    fn name(&self) -> &'static str {
        ":prepare-packages"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New | TaskStatus::Opinion => self.new_task(ctx),
            TaskStatus::Confirmed | TaskStatus::Triaged => self.confirmed(ctx),
            TaskStatus::InProgress | TaskStatus::FixCommitted => self.cranking(ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

// ============================================================================
// :promote-to-as-proposed
// ============================================================================

/// Mirror of -proposed into the as-proposed pocket, requested once
/// promote-to-proposed has copied everything.
pub struct SynPromoteToAsProposed;

impl SynPromoteToAsProposed {
    fn proposed_status(ctx: &TaskContext<'_>) -> Option<TaskStatus> {
        match ctx.task_status("promote-signing-to-proposed") {
            None | Some(TaskStatus::Invalid) => ctx.task_status("promote-to-proposed"),
            status => status,
        }
    }
}

impl TaskHandler for SynPromoteToAsProposed {
    fn name(&self) -> &'static str {
        ":promote-to-as-proposed"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        if !matches!(
            status,
            TaskStatus::New
                | TaskStatus::Opinion
                | TaskStatus::Confirmed
                | TaskStatus::Triaged
                | TaskStatus::InProgress
                | TaskStatus::FixCommitted
        ) {
            return Ok(Transition::Unmapped);
        }

        let debs = ctx.debs()?;
        let upstream = Self::proposed_status(ctx);
        if upstream == Some(TaskStatus::Invalid) || !debs.has_route(Pocket::AsProposed) {
            debug!(
                "Bug {} has no as-proposed mirror ({:?}), marking Invalid",
                ctx.bug.id, upstream
            );
            ctx.set_status(TaskStatus::Invalid);
            return Ok(ctx.outcome());
        }

        if !matches!(
            upstream,
            Some(TaskStatus::FixCommitted) | Some(TaskStatus::FixReleased)
        ) {
            ctx.set_reason(Reason::holding("waiting for promote-to-proposed"));
            return Ok(ctx.outcome());
        }
        if !debs.all_built_and_in_pocket_or_after(Pocket::Proposed) {
            ctx.set_reason(Reason::holding("packages not yet all in proposed"));
            return Ok(ctx.outcome());
        }

        ctx.set_reason(Reason::ongoing("packages not yet published"));

        if status != TaskStatus::FixCommitted {
            debs.request_copy(Pocket::Proposed, Pocket::AsProposed)?;
            let task = ctx.task_name().to_string();
            ctx.bug.push_event(BugEvent::CopyRequested {
                task,
                source: Pocket::Proposed,
                destination: Pocket::AsProposed,
            });
            ctx.set_status(TaskStatus::FixCommitted);
            ctx.bug.monitor_add(MonitorRecord::Pocket {
                pocket: Pocket::AsProposed,
            });
            return Ok(ctx.outcome());
        }

        ctx.bug.monitor_add(MonitorRecord::Pocket {
            pocket: Pocket::AsProposed,
        });
        if debs.all_built_in_pocket(Pocket::AsProposed) {
            ctx.set_status(TaskStatus::FixReleased);
        }
        Ok(ctx.outcome())
    }
}
