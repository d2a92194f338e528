//! The aggregate `kernel-sru-workflow` task: derives the bug phase, checks
//! the finished tasks against each other and the archive, and closes the bug.

use chrono::Duration;
use tracing::info;

use super::context::TaskContext;
use super::error::TaskError;
use super::promoter::Promoter;
use super::{TaskHandler, Transition};
use crate::bug::{Reason, TaskStatus, Variant};
use crate::providers::{DebsProvider, Pocket, PublishState, SnapRisk};

/// Primary phases use 1..PHASE_MAX; New/Confirmed stages sort after every
/// active one.
const PHASE_MAX: u32 = 10;
const PHASE_BETWEEN: u32 = 2;

fn promote_to(target: &str) -> String {
    format!("Promote to {}", target)
}

pub struct Workflow;

impl Workflow {
    fn debs_section(task: &str, status: TaskStatus) -> Option<(u32, String)> {
        let section = match task {
            ":prepare-packages" if status == TaskStatus::FixCommitted => return None,
            ":prepare-packages" => (1, "Packaging".to_string()),
            "promote-to-proposed" | "promote-signing-to-proposed" => {
                (2, promote_to(Pocket::Proposed.title()))
            }
            "promote-to-updates" => (5, promote_to(Pocket::Updates.title())),
            "promote-to-release" => (5, promote_to(Pocket::Release.title())),
            "promote-to-security" => (6, promote_to(Pocket::Security.title())),
            _ if task.ends_with("-testing") => (3, "Testing".to_string()),
            _ if task.ends_with("-signoff") => (4, "Signoff".to_string()),
            _ => return None,
        };
        Some(section)
    }

    fn snap_section(task: &str) -> Option<(u32, String)> {
        let section = match task {
            "snap-release-to-edge" => (1, promote_to(SnapRisk::Edge.title())),
            "snap-release-to-beta" => (2, promote_to(SnapRisk::Beta.title())),
            "snap-certification-testing" => (3, "Certification Testing".to_string()),
            "snap-release-to-candidate" => (4, promote_to(SnapRisk::Candidate.title())),
            "snap-qa-testing" => (5, "Q/A Testing".to_string()),
            "snap-release-to-stable" => (6, promote_to(SnapRisk::Stable.title())),
            _ => return None,
        };
        Some(section)
    }

    /// Phase text of the earliest stage still in play.
    pub fn phase(ctx: &TaskContext<'_>) -> Option<String> {
        let mut best: Option<(u32, String)> = None;

        for task in ctx.bug.tasks.values() {
            if matches!(
                task.status,
                TaskStatus::Invalid | TaskStatus::Opinion | TaskStatus::FixReleased
            ) {
                continue;
            }
            let section = match ctx.bug.variant {
                Variant::Debs | Variant::Combo => Self::debs_section(&task.name, task.status),
                Variant::SnapDebs => Self::snap_section(&task.name),
            };
            let Some((section, text)) = section else {
                continue;
            };

            let (section, text) = match task.status {
                TaskStatus::New => (
                    PHASE_MAX + section * PHASE_BETWEEN + 1,
                    format!("Holding before {}", text),
                ),
                TaskStatus::Confirmed => (
                    PHASE_MAX + section * PHASE_BETWEEN,
                    format!("Ready for {}", text),
                ),
                _ => (section, text),
            };

            if best.as_ref().is_none_or(|(current, _)| section < *current) {
                best = Some((section, text));
            }
        }

        best.map(|(_, text)| text)
    }

    fn snap_consistency(ctx: &mut TaskContext<'_>) {
        let Some(snap) = ctx.bug.snap.clone() else {
            return;
        };
        let inconsistencies = snap.channel_inconsistencies();
        if inconsistencies.is_empty() {
            ctx.bug.properties.reasons.remove("snap-publishing");
        } else {
            ctx.bug.properties.reasons.insert(
                "snap-publishing".to_string(),
                format!(
                    "snap channel revisions inconsistent {}",
                    inconsistencies.join(",")
                ),
            );
        }
    }

    fn released_to(debs: &dyn DebsProvider, pocket: Pocket) -> bool {
        Promoter::new(Pocket::Proposed, pocket).publication(debs) == PublishState::Published
    }

    /// Cross-check the finished tasks against the archive. Returns the first
    /// mismatch found.
    fn final_validation(ctx: &TaskContext<'_>) -> Result<Option<Reason>, TaskError> {
        let Some(debs) = ctx.bug.debs.clone() else {
            return Ok(None);
        };

        let release = if ctx.task_status("promote-to-release").is_some() {
            Some(("promote-to-release", Pocket::Release))
        } else if ctx.task_status("promote-to-updates").is_some() {
            Some(("promote-to-updates", Pocket::Updates))
        } else {
            None
        };
        if let Some((task, pocket)) = release {
            let released = Self::released_to(debs.as_ref(), pocket);
            match ctx.task_status(task) {
                Some(TaskStatus::Invalid) if released => {
                    return Ok(Some(Reason::stalled(
                        "packages have been released but the task set to Invalid",
                    )));
                }
                Some(TaskStatus::FixReleased) if !released => {
                    return Ok(Some(Reason::stalled(
                        "packages have not been released but the task set to Fix Released",
                    )));
                }
                _ => {}
            }
        }

        let Some(security) = ctx.task_status("promote-to-security") else {
            return Ok(None);
        };
        if !debs.has_route(Pocket::Security) {
            return Ok(None);
        }
        if !security.is_terminal() {
            return Ok(Some(Reason::stalled(format!(
                "promote-to-security is neither \"Fix Released\" nor \"Invalid\" ({})",
                security
            ))));
        }
        let released = Self::released_to(debs.as_ref(), Pocket::Security);
        if security == TaskStatus::Invalid && released {
            return Ok(Some(Reason::stalled(
                "packages have been released to security, but the task is set to \"Invalid\"",
            )));
        }
        if security == TaskStatus::FixReleased && !released {
            return Ok(Some(Reason::stalled(
                "packages have not been released to security, but the task is set to \"Fix Released\"",
            )));
        }

        let signoff = ctx.require_task("security-signoff")?;
        if signoff != security {
            return Ok(Some(Reason::stalled(format!(
                "package promote-to-security status ({}) does not match security-signoff status ({})",
                security, signoff
            ))));
        }
        Ok(None)
    }

    fn complete(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if let Some(phase) = Self::phase(ctx) {
            ctx.set_phase(&phase);
        }
        Self::snap_consistency(ctx);

        let outstanding: Vec<&str> = ctx
            .bug
            .tasks
            .values()
            .filter(|task| task.name != ctx.task_name() && !task.status.is_terminal())
            .map(|task| task.name.as_str())
            .collect();
        if !outstanding.is_empty() {
            let reason = Reason::ongoing(format!("{} tasks outstanding", outstanding.len()));
            ctx.set_reason(reason);
            return Ok(ctx.outcome());
        }

        if let Some(reason) = Self::final_validation(ctx)? {
            ctx.set_reason(reason);
            return Ok(ctx.outcome());
        }

        ctx.set_phase("Complete");
        let changed = ctx.bug.properties.phase_changed.unwrap_or(ctx.now);
        let close_time =
            changed + Duration::minutes(i64::from(ctx.config.workflow.final_close_delay_minutes));
        if ctx.now <= close_time {
            info!(
                "Bug {} complete, holding open until {}",
                ctx.bug.id, close_time
            );
            ctx.bug.refresh_at(close_time, "final close delay");
            ctx.set_reason(Reason::holding(format!(
                "complete, holding open until {}",
                close_time.format("%Y-%m-%d %H:%M")
            )));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::FixReleased);
        ctx.bug.add_comment(
            "Workflow done!",
            "All tasks have been completed and the bug is being set to Fix Released\n",
        );
        Ok(ctx.outcome())
    }
}

impl TaskHandler for Workflow {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn evaluate(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        match status {
            TaskStatus::Confirmed
            | TaskStatus::Triaged
            | TaskStatus::InProgress
            | TaskStatus::FixCommitted => self.complete(ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::{Bug, BugEvent};
    use crate::config::EngineConfig;
    use crate::testing::{fixtures, MockSnap};
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    const WORKFLOW: &str = "kernel-sru-workflow";

    fn evaluate_at(bug: &mut Bug, now: DateTime<Utc>) -> Transition {
        let status = bug.task_status(WORKFLOW).unwrap();
        let config = EngineConfig::default();
        let mut ctx = TaskContext::new(bug, WORKFLOW, now, &config);
        Workflow.evaluate(status, &mut ctx).unwrap()
    }

    fn finish_everything(bug: &mut Bug) {
        for task in bug.tasks.values_mut() {
            if task.name != WORKFLOW {
                task.status = TaskStatus::FixReleased;
            }
        }
    }

    #[test]
    fn test_phase_prefers_active_stage() {
        let mut bug = fixtures::sru_bug(1001)
            .with_task(":prepare-packages", TaskStatus::FixReleased)
            .with_task("promote-to-proposed", TaskStatus::FixReleased)
            .with_task("automated-testing", TaskStatus::InProgress)
            .with_task("stakeholder-signoff", TaskStatus::Confirmed)
            .with_task("promote-to-updates", TaskStatus::New);

        evaluate_at(&mut bug, fixtures::now());
        assert_eq!(bug.properties.phase.as_deref(), Some("Testing"));

        bug.task_mut("automated-testing").unwrap().status = TaskStatus::FixReleased;
        evaluate_at(&mut bug, fixtures::now());
        assert_eq!(bug.properties.phase.as_deref(), Some("Ready for Signoff"));
    }

    #[test]
    fn test_open_task_keeps_bug_open() {
        let (mut bug, _debs) = fixtures::ready_for_updates(1001);
        finish_everything(&mut bug);
        bug.task_mut("promote-to-updates").unwrap().status = TaskStatus::InProgress;

        let later = fixtures::now() + Duration::days(2);
        evaluate_at(&mut bug, later);
        assert_eq!(bug.task_status(WORKFLOW), Some(TaskStatus::InProgress));
    }

    #[test]
    fn test_security_mismatch_blocks_closure() {
        let (mut bug, _debs) = fixtures::ready_for_updates(1001);
        finish_everything(&mut bug);

        evaluate_at(&mut bug, fixtures::now());
        let reason = bug.task(WORKFLOW).unwrap().reason.clone().unwrap();
        assert_eq!(reason.state, crate::bug::ReasonState::Stalled);
        assert_eq!(bug.task_status(WORKFLOW), Some(TaskStatus::InProgress));
    }

    #[test]
    fn test_closes_after_delay() {
        let (mut bug, debs) = fixtures::ready_for_updates(1001);
        finish_everything(&mut bug);
        debs.set_publish_state(Pocket::Updates, PublishState::Published);
        debs.set_publish_state(Pocket::Security, PublishState::Published);

        let now = fixtures::now();
        evaluate_at(&mut bug, now);
        assert_eq!(bug.properties.phase.as_deref(), Some("Complete"));
        assert_eq!(bug.task_status(WORKFLOW), Some(TaskStatus::InProgress));
        assert!(bug.events.iter().any(|event| matches!(
            event,
            BugEvent::RefreshAt { reason, .. } if reason == "final close delay"
        )));

        let result = evaluate_at(&mut bug, now + Duration::minutes(61));
        assert_eq!(result, Transition::Changed);
        assert_eq!(bug.task_status(WORKFLOW), Some(TaskStatus::FixReleased));
        assert!(bug.events.iter().any(|event| matches!(
            event,
            BugEvent::Comment { subject, .. } if subject == "Workflow done!"
        )));
    }

    #[test]
    fn test_snap_inconsistency_recorded() {
        let snap = MockSnap::new();
        snap.set_inconsistencies(vec!["stable:12!=13".to_string()]);
        let mut bug = fixtures::snap_bug(2001).with_snap(Arc::new(snap.clone()));

        evaluate_at(&mut bug, fixtures::now());
        assert_eq!(
            bug.properties.reasons.get("snap-publishing").map(String::as_str),
            Some("snap channel revisions inconsistent stable:12!=13")
        );

        snap.set_inconsistencies(Vec::new());
        evaluate_at(&mut bug, fixtures::now());
        assert!(!bug.properties.reasons.contains_key("snap-publishing"));
    }
}
