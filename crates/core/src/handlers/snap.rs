//! Snap-store release ladder: prepare, edge -> beta -> candidate -> stable,
//! then publish.

use tracing::{debug, info};

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{MonitorRecord, Reason, TaskStatus};
use crate::providers::SnapRisk;

// ============================================================================
// snap-prepare
// ============================================================================

pub struct SnapPrepare;

impl TaskHandler for SnapPrepare {
    fn name(&self) -> &'static str {
        "snap-prepare"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New => {
                if let Some(tag) = ctx.bug.block_present(&["kernel-block-source", "kernel-block"]) {
                    ctx.set_reason(Reason::stalled(format!("blocked via {}", tag)));
                    return Ok(ctx.outcome());
                }
                if ctx.bug.task_status_or_master("prepare-package") != Some(TaskStatus::FixReleased)
                {
                    ctx.set_reason(Reason::holding("waiting for debs to be prepared"));
                    return Ok(ctx.outcome());
                }
                ctx.set_status(TaskStatus::Confirmed);
                ctx.timestamp("started");
                Ok(ctx.outcome())
            }
            TaskStatus::Confirmed | TaskStatus::InProgress | TaskStatus::FixCommitted => {
                let snap = ctx.snap()?;
                if snap.prepared() {
                    ctx.set_status(TaskStatus::FixReleased);
                    ctx.timestamp("finished");
                } else if status == TaskStatus::Confirmed {
                    ctx.set_reason(Reason::pending("snap ready to be built"));
                } else {
                    ctx.set_reason(Reason::ongoing("snap being built"));
                }
                Ok(ctx.outcome())
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}

// ============================================================================
// snap-release-to-<risk>
// ============================================================================

/// Release of the snap into one risk channel.
pub struct SnapRelease {
    risk: SnapRisk,
}

impl SnapRelease {
    pub fn new(risk: SnapRisk) -> Self {
        Self { risk }
    }

    /// The stage this one waits on: the nearest lower risk present on the
    /// bug (Invalid stages are skipped), or snap-prepare.
    fn previous_stage(&self, ctx: &TaskContext<'_>) -> (String, Option<TaskStatus>) {
        let lower = SnapRisk::ALL
            .iter()
            .rev()
            .filter(|risk| **risk < self.risk)
            .map(|risk| risk.task_name())
            .find_map(|name| match ctx.task_status(&name) {
                Some(TaskStatus::Invalid) | None => None,
                status => Some((name, status)),
            });
        lower.unwrap_or_else(|| {
            (
                "snap-prepare".to_string(),
                ctx.task_status("snap-prepare"),
            )
        })
    }

    /// Testing done in the previous channel that has to pass first.
    fn testing_task(&self) -> Option<&'static str> {
        match self.risk {
            SnapRisk::Candidate => Some("snap-certification-testing"),
            SnapRisk::Stable => Some("snap-qa-testing"),
            _ => None,
        }
    }

    fn block(&self, ctx: &TaskContext<'_>) -> Option<String> {
        let tag = self.risk.block_tag();
        ctx.bug.block_present(&[tag.as_str(), "kernel-block"])
    }

    /// Stable waits for the companion debs to reach a production pocket.
    fn debs_hold(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        if self.risk != SnapRisk::Stable {
            return None;
        }
        if ctx.bug.development_series {
            return match ctx.bug.task_status_or_master("promote-to-release") {
                Some(TaskStatus::FixReleased) | Some(TaskStatus::Invalid) => None,
                _ => Some(Reason::holding("waiting for debs to promote-to-release")),
            };
        }

        match ctx.bug.task_status_or_master("promote-to-updates") {
            Some(TaskStatus::FixReleased) => None,
            Some(status) if status != TaskStatus::Invalid => {
                Some(Reason::holding("waiting for debs to promote-to-updates"))
            }
            _ => match ctx.bug.task_status_or_master("promote-to-security") {
                Some(TaskStatus::FixReleased) => None,
                _ => Some(Reason::holding("waiting for debs to promote-to-security")),
            },
        }
    }

    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let snap = ctx.snap()?;
        if !snap.promote_eligible(self.risk) {
            debug!(
                "Bug {} snap not released to {}, marking Invalid",
                ctx.bug.id, self.risk
            );
            ctx.set_status(TaskStatus::Invalid);
            return Ok(ctx.outcome());
        }

        if let Some(tag) = self.block(ctx) {
            ctx.set_reason(Reason::stalled(format!("blocked via {}", tag)));
            return Ok(ctx.outcome());
        }

        let (previous, status) = self.previous_stage(ctx);
        if status != Some(TaskStatus::FixReleased) {
            ctx.set_reason(Reason::holding(format!("waiting for {}", previous)));
            return Ok(ctx.outcome());
        }

        if let Some(testing) = self.testing_task() {
            if let Some(status) = ctx.task_status(testing) {
                if !status.is_complete() {
                    ctx.set_reason(Reason::holding(format!(
                        "waiting for testing ({}: {})",
                        testing, status
                    )));
                    return Ok(ctx.outcome());
                }
            }
        }

        if let Some(reason) = self.debs_hold(ctx) {
            ctx.set_reason(reason);
            return Ok(ctx.outcome());
        }

        if let Some(older) = snap.older_tracker(self.risk) {
            ctx.bug
                .monitor_add(MonitorRecord::TrackerModified { watch: older });
            ctx.set_reason(Reason::stalled(format!(
                "tracker for earlier spin {} still releasing to {}",
                older, self.risk
            )));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        ctx.set_reason(Reason::pending(format!("ready to release to {}", self.risk)));
        Ok(ctx.outcome())
    }

    fn releasing(&self, status: TaskStatus, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let snap = ctx.snap()?;

        if snap.in_channel(self.risk) {
            info!("Bug {} snap visible in {}", ctx.bug.id, self.risk);
            ctx.set_status(TaskStatus::FixReleased);
            ctx.timestamp("finished");
            return Ok(ctx.outcome());
        }

        if status == TaskStatus::Confirmed {
            if let Some(tag) = self.block(ctx) {
                ctx.pull_back(Reason::stalled(format!("blocked via {}", tag)));
                return Ok(ctx.outcome());
            }
            ctx.set_reason(Reason::pending(format!("ready to release to {}", self.risk)));
        } else {
            ctx.set_reason(Reason::ongoing(format!("releasing to {}", self.risk)));
        }
        ctx.bug.monitor_add(MonitorRecord::SnapChannel {
            risk: self.risk.as_str().to_string(),
        });
        Ok(ctx.outcome())
    }
}

impl TaskHandler for SnapRelease {
    fn name(&self) -> &'static str {
        "snap-release"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New => self.new_task(ctx),
            TaskStatus::Confirmed
            | TaskStatus::Triaged
            | TaskStatus::InProgress
            | TaskStatus::FixCommitted => self.releasing(status, ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

// ============================================================================
// snap-publish
// ============================================================================

/// Store metadata publication once the top of the ladder is reached.
pub struct SnapPublish;

impl TaskHandler for SnapPublish {
    fn name(&self) -> &'static str {
        "snap-publish"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::New => {
                let top = SnapRisk::ALL
                    .iter()
                    .rev()
                    .map(|risk| risk.task_name())
                    .find_map(|name| match ctx.task_status(&name) {
                        Some(TaskStatus::Invalid) | None => None,
                        status => Some((name, status)),
                    });
                match top {
                    Some((_, Some(TaskStatus::FixReleased))) => {
                        ctx.set_status(TaskStatus::Confirmed);
                        ctx.timestamp("started");
                    }
                    Some((name, _)) => {
                        ctx.set_reason(Reason::holding(format!("waiting for {}", name)));
                    }
                    None => ctx.set_status(TaskStatus::Invalid),
                }
                Ok(ctx.outcome())
            }
            TaskStatus::Confirmed | TaskStatus::InProgress | TaskStatus::FixCommitted => {
                let snap = ctx.snap()?;
                if snap.published() {
                    ctx.set_status(TaskStatus::FixReleased);
                    ctx.timestamp("finished");
                } else {
                    ctx.set_reason(Reason::ongoing("waiting for store publication"));
                }
                Ok(ctx.outcome())
            }
            _ => Ok(Transition::Unmapped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::Bug;
    use crate::config::EngineConfig;
    use crate::testing::{fixtures, MockSnap};
    use std::sync::Arc;

    fn evaluate(handler: &dyn TaskHandler, bug: &mut Bug, task: &str) -> Transition {
        let status = bug.task_status(task).unwrap();
        let config = EngineConfig::default();
        let mut ctx = TaskContext::new(bug, task, fixtures::now(), &config);
        handler.evaluate(status, &mut ctx).unwrap()
    }

    fn reason(bug: &Bug, task: &str) -> String {
        bug.task(task).unwrap().reason.clone().unwrap().to_string()
    }

    #[test]
    fn test_prepare_waits_for_debs() {
        let snap = MockSnap::new();
        let master = fixtures::sru_bug(900).with_task("prepare-package", TaskStatus::InProgress);
        let mut bug = fixtures::snap_bug(2001)
            .with_snap(Arc::new(snap.clone()))
            .with_master(900, Some(Arc::new(master.clone())));

        evaluate(&SnapPrepare, &mut bug, "snap-prepare");
        assert_eq!(bug.task_status("snap-prepare"), Some(TaskStatus::New));

        let master = master.with_task("prepare-package", TaskStatus::FixReleased);
        bug = bug.with_master(900, Some(Arc::new(master)));
        evaluate(&SnapPrepare, &mut bug, "snap-prepare");
        assert_eq!(bug.task_status("snap-prepare"), Some(TaskStatus::Confirmed));

        snap.set_prepared(true);
        evaluate(&SnapPrepare, &mut bug, "snap-prepare");
        assert_eq!(bug.task_status("snap-prepare"), Some(TaskStatus::FixReleased));
    }

    #[test]
    fn test_ladder_gating() {
        let snap = MockSnap::new();
        let mut bug = fixtures::snap_bug(2001).with_snap(Arc::new(snap.clone()));
        let beta = SnapRelease::new(SnapRisk::Beta);

        evaluate(&beta, &mut bug, "snap-release-to-beta");
        assert_eq!(reason(&bug, "snap-release-to-beta"), "Holding -- waiting for snap-release-to-edge");

        bug.task_mut("snap-release-to-edge").unwrap().status = TaskStatus::FixReleased;
        evaluate(&beta, &mut bug, "snap-release-to-beta");
        assert_eq!(bug.task_status("snap-release-to-beta"), Some(TaskStatus::Confirmed));

        snap.set_in_channel(SnapRisk::Beta, true);
        evaluate(&beta, &mut bug, "snap-release-to-beta");
        assert_eq!(bug.task_status("snap-release-to-beta"), Some(TaskStatus::FixReleased));
    }

    #[test]
    fn test_ineligible_risk_is_invalid_and_skipped() {
        let snap = MockSnap::new();
        snap.set_eligible(SnapRisk::Beta, false);
        let mut bug = fixtures::snap_bug(2001).with_snap(Arc::new(snap.clone()));

        evaluate(&SnapRelease::new(SnapRisk::Beta), &mut bug, "snap-release-to-beta");
        assert_eq!(bug.task_status("snap-release-to-beta"), Some(TaskStatus::Invalid));

        bug.task_mut("snap-release-to-edge").unwrap().status = TaskStatus::FixReleased;
        bug.task_mut("snap-certification-testing").unwrap().status = TaskStatus::Invalid;
        evaluate(&SnapRelease::new(SnapRisk::Candidate), &mut bug, "snap-release-to-candidate");
        assert_eq!(
            bug.task_status("snap-release-to-candidate"),
            Some(TaskStatus::Confirmed)
        );
    }

    #[test]
    fn test_block_tag_and_pull_back() {
        let snap = MockSnap::new();
        let mut bug = fixtures::snap_bug(2001)
            .with_snap(Arc::new(snap))
            .with_tag("kernel-block-snap-edge");
        bug.task_mut("snap-prepare").unwrap().status = TaskStatus::FixReleased;
        let edge = SnapRelease::new(SnapRisk::Edge);

        evaluate(&edge, &mut bug, "snap-release-to-edge");
        assert_eq!(reason(&bug, "snap-release-to-edge"), "Stalled -- blocked via kernel-block-snap-edge");

        bug.remove_tag("kernel-block-snap-edge");
        evaluate(&edge, &mut bug, "snap-release-to-edge");
        assert_eq!(bug.task_status("snap-release-to-edge"), Some(TaskStatus::Confirmed));

        bug.add_tag("kernel-block");
        evaluate(&edge, &mut bug, "snap-release-to-edge");
        assert_eq!(bug.task_status("snap-release-to-edge"), Some(TaskStatus::New));
    }

    #[test]
    fn test_older_tracker_stalls() {
        let snap = MockSnap::new();
        snap.set_older_tracker(SnapRisk::Edge, Some(1990));
        let mut bug = fixtures::snap_bug(2001).with_snap(Arc::new(snap));
        bug.task_mut("snap-prepare").unwrap().status = TaskStatus::FixReleased;

        evaluate(&SnapRelease::new(SnapRisk::Edge), &mut bug, "snap-release-to-edge");
        assert_eq!(bug.task_status("snap-release-to-edge"), Some(TaskStatus::New));
        assert!(reason(&bug, "snap-release-to-edge").contains("earlier spin 1990"));
    }

    #[test]
    fn test_stable_waits_for_security_debs() {
        let snap = MockSnap::new();
        let master = fixtures::sru_bug(900)
            .with_task("promote-to-updates", TaskStatus::Invalid)
            .with_task("promote-to-security", TaskStatus::InProgress);
        let mut bug = fixtures::snap_bug(2001)
            .with_snap(Arc::new(snap))
            .with_master(900, Some(Arc::new(master)));
        bug.task_mut("snap-release-to-candidate").unwrap().status = TaskStatus::FixReleased;
        bug.task_mut("snap-qa-testing").unwrap().status = TaskStatus::FixReleased;

        let result = evaluate(&SnapRelease::new(SnapRisk::Stable), &mut bug, "snap-release-to-stable");
        assert_eq!(result, Transition::Unchanged);
        assert_eq!(
            reason(&bug, "snap-release-to-stable"),
            "Holding -- waiting for debs to promote-to-security"
        );
    }

    #[test]
    fn test_publish_follows_stable() {
        let snap = MockSnap::new();
        let mut bug = fixtures::snap_bug(2001).with_snap(Arc::new(snap.clone()));

        evaluate(&SnapPublish, &mut bug, "snap-publish");
        assert_eq!(bug.task_status("snap-publish"), Some(TaskStatus::New));

        bug.task_mut("snap-release-to-stable").unwrap().status = TaskStatus::FixReleased;
        evaluate(&SnapPublish, &mut bug, "snap-publish");
        assert_eq!(bug.task_status("snap-publish"), Some(TaskStatus::Confirmed));

        snap.set_published(true);
        evaluate(&SnapPublish, &mut bug, "snap-publish");
        assert_eq!(bug.task_status("snap-publish"), Some(TaskStatus::FixReleased));
    }
}
