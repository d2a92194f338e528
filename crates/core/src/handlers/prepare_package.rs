use tracing::debug;

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{Reason, TaskStatus};

const SOURCE_BLOCK_TAGS: [&str; 2] = ["kernel-block-source", "kernel-block"];

/// One buildable component of the source (`main`, `meta`, `signed`, ...).
///
/// The primary package (`main`) of a derivative waits for its master's
/// primary package to be released; secondary packages wait for their own
/// primary to be started.
pub struct PreparePackage {
    component: String,
}

impl PreparePackage {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
        }
    }

    fn is_primary(&self) -> bool {
        self.component == "main"
    }

    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if let Some(tag) = ctx.bug.block_present(&SOURCE_BLOCK_TAGS) {
            ctx.set_reason(Reason::stalled(format!("blocked via {}", tag)));
            return Ok(ctx.outcome());
        }

        let debs = ctx.debs()?;
        if !debs.valid_package(&self.component) {
            debug!(
                "Bug {} has no {} package, marking Invalid",
                ctx.bug.id, self.component
            );
            ctx.set_status(TaskStatus::Invalid);
            return Ok(ctx.outcome());
        }

        if let Some(reason) = self.dependency_hold(ctx)? {
            ctx.set_reason(reason);
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        ctx.set_phase("Packaging");
        Ok(ctx.outcome())
    }

    fn dependency_hold(&self, ctx: &TaskContext<'_>) -> Result<Option<Reason>, TaskError> {
        if !self.is_primary() {
            let primary = ctx.require_task("prepare-package")?;
            if !primary.is_started() {
                return Ok(Some(Reason::holding(format!(
                    "waiting for prepare-package ({})",
                    primary
                ))));
            }
        }

        let Some(link) = ctx.bug.master.as_ref() else {
            return Ok(None);
        };
        let Some(master) = link.view.as_ref() else {
            return Ok(Some(Reason::holding(format!(
                "master bug {} not available",
                link.id
            ))));
        };
        let Some(status) = master.task_status("prepare-package") else {
            return Ok(None);
        };

        let qualifies = if self.is_primary() {
            status == TaskStatus::FixReleased
        } else {
            status.is_started()
        };
        if qualifies {
            Ok(None)
        } else {
            Ok(Some(Reason::holding(format!(
                "master bug {} prepare-package is {}",
                link.id, status
            ))))
        }
    }

    fn active(&self, status: TaskStatus, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let debs = ctx.debs()?;

        if !debs.uploaded(&self.component) {
            let reason = if status == TaskStatus::Confirmed {
                Reason::pending(format!("{} ready to be cranked", self.component))
            } else {
                Reason::ongoing(format!("{} being cranked", self.component))
            };
            ctx.set_reason(reason);
            return Ok(ctx.outcome());
        }

        if !debs.release_tag_published(&self.component) {
            ctx.set_reason(Reason::stalled(format!(
                "{} uploaded but release tag not published",
                self.component
            )));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::FixReleased);
        ctx.timestamp("finished");
        if let Some(uploader) = debs.uploader(&self.component) {
            ctx.set_assignee(Some(uploader));
        }
        Ok(ctx.outcome())
    }
}

impl TaskHandler for PreparePackage {
    fn name(&self) -> &'static str {
        "prepare-package"
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
            | TaskStatus::FixCommitted => self.active(status, ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::Bug;
    use crate::config::EngineConfig;
    use crate::testing::{fixtures, MockDebs};
    use std::sync::Arc;

    fn evaluate(bug: &mut Bug, task: &str) -> Transition {
        let handler = PreparePackage::new(match task {
            "prepare-package" => "main",
            other => &other["prepare-package-".len()..],
        });
        let status = bug.task_status(task).unwrap();
        let config = EngineConfig::default();
        let mut ctx = TaskContext::new(bug, task, fixtures::now(), &config);
        handler.evaluate(status, &mut ctx).unwrap()
    }

    fn packaging_bug(debs: &MockDebs) -> Bug {
        fixtures::sru_bug(1001)
            .with_debs(Arc::new(debs.clone()))
            .with_task("prepare-package", TaskStatus::New)
            .with_task("prepare-package-meta", TaskStatus::New)
    }

    #[test]
    fn test_primary_confirms() {
        let debs = fixtures::debs_for_packaging();
        let mut bug = packaging_bug(&debs);

        assert_eq!(evaluate(&mut bug, "prepare-package"), Transition::Changed);
        assert_eq!(bug.task_status("prepare-package"), Some(TaskStatus::Confirmed));
        assert_eq!(bug.properties.phase.as_deref(), Some("Packaging"));
    }

    #[test]
    fn test_source_block_stalls() {
        let debs = fixtures::debs_for_packaging();
        let mut bug = packaging_bug(&debs).with_tag("kernel-block-source");

        assert_eq!(evaluate(&mut bug, "prepare-package"), Transition::Unchanged);
        let reason = bug.task("prepare-package").unwrap().reason.clone().unwrap();
        assert_eq!(reason.to_string(), "Stalled -- blocked via kernel-block-source");
    }

    #[test]
    fn test_invalid_component() {
        let debs = fixtures::debs_for_packaging();
        let mut bug = packaging_bug(&debs).with_task("prepare-package-lrm", TaskStatus::New);

        evaluate(&mut bug, "prepare-package-lrm");
        assert_eq!(bug.task_status("prepare-package-lrm"), Some(TaskStatus::Invalid));
    }

    #[test]
    fn test_secondary_waits_for_primary_start() {
        let debs = fixtures::debs_for_packaging();
        let mut bug = packaging_bug(&debs);

        assert_eq!(evaluate(&mut bug, "prepare-package-meta"), Transition::Unchanged);

        bug.task_mut("prepare-package").unwrap().status = TaskStatus::InProgress;
        assert_eq!(evaluate(&mut bug, "prepare-package-meta"), Transition::Changed);
        assert_eq!(bug.task_status("prepare-package-meta"), Some(TaskStatus::Confirmed));
    }

    #[test]
    fn test_derivative_primary_waits_for_master() {
        let debs = fixtures::debs_for_packaging();
        let master = fixtures::sru_bug(900).with_task("prepare-package", TaskStatus::InProgress);
        let mut bug = packaging_bug(&debs).with_master(900, Some(Arc::new(master)));

        assert_eq!(evaluate(&mut bug, "prepare-package"), Transition::Unchanged);
        let reason = bug.task("prepare-package").unwrap().reason.clone().unwrap();
        assert_eq!(reason.text, "master bug 900 prepare-package is In Progress");
    }

    #[test]
    fn test_released_once_uploaded_and_tagged() {
        let debs = fixtures::debs_for_packaging();
        let mut bug = packaging_bug(&debs);
        bug.task_mut("prepare-package").unwrap().status = TaskStatus::InProgress;

        debs.set_component_uploaded("main", true, Some("kernel-hacker"));
        assert_eq!(evaluate(&mut bug, "prepare-package"), Transition::Unchanged);
        let reason = bug.task("prepare-package").unwrap().reason.clone().unwrap();
        assert_eq!(reason.state, crate::bug::ReasonState::Stalled);

        debs.set_component_tag_published("main", true);
        assert_eq!(evaluate(&mut bug, "prepare-package"), Transition::Changed);
        let task = bug.task("prepare-package").unwrap();
        assert_eq!(task.status, TaskStatus::FixReleased);
        assert_eq!(task.assignee.as_deref(), Some("kernel-hacker"));
    }
}
