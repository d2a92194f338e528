//! Testing stages: driven by pass/fail tags on the bug or by the external
//! test-results feed.

use tracing::{debug, info};

use super::context::TaskContext;
use super::error::TaskError;
use super::{TaskHandler, Transition};
use crate::bug::{BugEvent, Reason, TaskStatus};
use crate::providers::{feed_status, Pocket, TestQuery};

/// What has to be true before a testing task may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartGate {
    /// Packages are built and in -proposed (or beyond).
    ReadyForTesting,
    /// Another task on this bug reached Fix Released.
    TaskReleased(&'static str),
}

/// One testing task. The per-task constructors below fix which tags and
/// feeds drive it.
pub struct TestingHandler {
    title: &'static str,
    gate: StartGate,
    /// Pocket that must be routed for the test to exist at all.
    route: Option<Pocket>,
    /// Extra tag prefixes accepted alongside `<task>-passed` / `<task>-failed`.
    aliases: &'static [&'static str],
    /// Accept `verification-done-<series>` / `verification-failed-<series>`.
    series_tags: bool,
    use_feed: bool,
    request_testing: bool,
}

impl TestingHandler {
    fn deb(title: &'static str) -> Self {
        Self {
            title,
            gate: StartGate::ReadyForTesting,
            route: Some(Pocket::Proposed),
            aliases: &[],
            series_tags: false,
            use_feed: false,
            request_testing: false,
        }
    }

    pub fn automated() -> Self {
        Self {
            use_feed: true,
            request_testing: true,
            ..Self::deb("Automated Testing")
        }
    }

    pub fn certification() -> Self {
        Self {
            request_testing: true,
            ..Self::deb("Certification Testing")
        }
    }

    pub fn regression() -> Self {
        Self {
            aliases: &["qa-testing"],
            request_testing: true,
            ..Self::deb("Regression Testing")
        }
    }

    pub fn boot() -> Self {
        Self {
            use_feed: true,
            request_testing: true,
            ..Self::deb("Boot Testing")
        }
    }

    pub fn verification() -> Self {
        Self {
            series_tags: true,
            ..Self::deb("Verification Testing")
        }
    }

    pub fn abi() -> Self {
        Self {
            gate: StartGate::TaskReleased("prepare-package"),
            ..Self::deb("ABI Testing")
        }
    }

    pub fn snap_qa() -> Self {
        Self {
            title: "Snap QA Testing",
            gate: StartGate::TaskReleased("snap-release-to-candidate"),
            route: None,
            aliases: &[],
            series_tags: false,
            use_feed: false,
            request_testing: false,
        }
    }

    pub fn snap_certification() -> Self {
        Self {
            title: "Snap Certification Testing",
            gate: StartGate::TaskReleased("snap-release-to-beta"),
            ..Self::snap_qa()
        }
    }

    fn gate_open(&self, ctx: &TaskContext<'_>) -> Result<bool, TaskError> {
        match self.gate {
            StartGate::ReadyForTesting => Ok(ctx.debs()?.ready_for_testing()),
            StartGate::TaskReleased(task) => {
                Ok(ctx.task_status(task) == Some(TaskStatus::FixReleased))
            }
        }
    }

    fn routed(&self, ctx: &TaskContext<'_>) -> Result<bool, TaskError> {
        match self.route {
            Some(pocket) => Ok(ctx.debs()?.has_route(pocket)),
            None => Ok(true),
        }
    }

    fn tagged(&self, ctx: &TaskContext<'_>, outcome: &str) -> bool {
        let task = ctx.task_name();
        if ctx.has_tag(&format!("{}-{}", task, outcome)) {
            return true;
        }
        if self
            .aliases
            .iter()
            .any(|alias| ctx.has_tag(&format!("{}-{}", alias, outcome)))
        {
            return true;
        }
        if self.series_tags {
            let word = if outcome == "passed" { "done" } else { "failed" };
            return ctx.has_tag(&format!("verification-{}-{}", word, ctx.bug.series));
        }
        false
    }

    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if !self.routed(ctx)? {
            info!(
                "Bug {} {}: no test route, marking Invalid",
                ctx.bug.id,
                ctx.task_name()
            );
            ctx.set_status(TaskStatus::Invalid);
            return Ok(ctx.outcome());
        }
        if !self.gate_open(ctx)? {
            ctx.set_reason(Reason::holding("not ready for testing"));
            return Ok(ctx.outcome());
        }

        ctx.set_status(TaskStatus::Confirmed);
        ctx.timestamp("started");
        if self.request_testing {
            let task = ctx.task_name().to_string();
            ctx.bug.push_event(BugEvent::TestingRequested {
                task,
                pocket: Pocket::Proposed,
            });
        }
        Ok(ctx.outcome())
    }

    fn fail(&self, ctx: &mut TaskContext<'_>, why: &str) {
        if ctx.status() == TaskStatus::Incomplete {
            return;
        }
        ctx.bug
            .add_comment(&format!("{} FAILURE", self.title), why);
        ctx.set_status(TaskStatus::Incomplete);
        ctx.set_phase("Testing Failed");
    }

    fn status_check(&self, status: TaskStatus, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        if !self.routed(ctx)? {
            ctx.set_status(TaskStatus::Invalid);
            return Ok(ctx.outcome());
        }

        let present = self.gate_open(ctx)?;
        if !present {
            if status != TaskStatus::Opinion && status != TaskStatus::Incomplete {
                info!(
                    "Bug {} {}: artifacts no longer present, aborting",
                    ctx.bug.id,
                    ctx.task_name()
                );
                ctx.set_status(TaskStatus::Opinion);
            }
            ctx.set_reason(Reason::stalled("testing aborted"));
            return Ok(ctx.outcome());
        }
        if status == TaskStatus::Opinion {
            ctx.set_status(TaskStatus::New);
            return Ok(ctx.outcome());
        }

        if self.tagged(ctx, "failed") {
            let body = format!("The bug was tagged as {}-failed\n", ctx.task_name());
            self.fail(ctx, &body);
        } else if self.tagged(ctx, "passed") {
            ctx.set_status(TaskStatus::FixReleased);
            ctx.timestamp("finished");
        } else if self.use_feed {
            self.poll_feed(ctx)?;
        } else {
            debug!("Bug {} {} still running", ctx.bug.id, ctx.task_name());
        }

        match ctx.status() {
            TaskStatus::FixReleased => {}
            TaskStatus::Incomplete => ctx.set_reason(Reason::stalled("testing FAILED")),
            _ => ctx.set_reason(Reason::ongoing("testing in progress")),
        }
        Ok(ctx.outcome())
    }

    fn poll_feed(&self, ctx: &mut TaskContext<'_>) -> Result<(), TaskError> {
        let Some(feed) = ctx.bug.test_results.clone() else {
            return Ok(());
        };
        let query = TestQuery {
            task: ctx.task_name().to_string(),
            series: ctx.bug.series.clone(),
            source: ctx.bug.source.clone(),
            version: ctx.bug.version.clone(),
        };
        let Some(result) = feed.lookup(&query)? else {
            return Ok(());
        };

        match feed_status(&result) {
            TaskStatus::Incomplete => {
                let body = format!(
                    "{} reported {} for {} {} in {}\n",
                    self.title,
                    result,
                    query.source,
                    query.version.as_deref().unwrap_or("(unversioned)"),
                    query.series
                );
                self.fail(ctx, &body);
            }
            TaskStatus::FixReleased => {
                ctx.set_status(TaskStatus::FixReleased);
                ctx.timestamp("finished");
            }
            other => {
                if ctx.status() == TaskStatus::Confirmed {
                    ctx.set_status(other);
                }
            }
        }
        Ok(())
    }
}

impl TaskHandler for TestingHandler {
    fn name(&self) -> &'static str {
        self.title
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
            | TaskStatus::FixCommitted
            | TaskStatus::Incomplete
            | TaskStatus::Opinion => self.status_check(status, ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bug::Bug;
    use crate::config::EngineConfig;
    use crate::testing::{fixtures, MockTestResults};
    use std::sync::Arc;

    fn evaluate(handler: &TestingHandler, bug: &mut Bug, task: &str) -> Result<Transition, TaskError> {
        let status = bug.task_status(task).unwrap();
        let config = EngineConfig::default();
        let mut ctx = TaskContext::new(bug, task, fixtures::now(), &config);
        handler.evaluate(status, &mut ctx)
    }

    fn comments(bug: &Bug) -> Vec<String> {
        bug.events
            .iter()
            .filter_map(|event| match event {
                BugEvent::Comment { subject, .. } => Some(subject.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_starts_once_in_proposed() {
        let (bug, debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug.with_task("certification-testing", TaskStatus::New);
        debs.set_built(Pocket::Proposed, false);

        evaluate(&TestingHandler::certification(), &mut bug, "certification-testing").unwrap();
        assert_eq!(bug.task_status("certification-testing"), Some(TaskStatus::New));

        debs.set_built(Pocket::Proposed, true);
        evaluate(&TestingHandler::certification(), &mut bug, "certification-testing").unwrap();
        assert_eq!(bug.task_status("certification-testing"), Some(TaskStatus::Confirmed));
        assert!(bug.events.iter().any(|event| matches!(
            event,
            BugEvent::TestingRequested { task, .. } if task == "certification-testing"
        )));
    }

    #[test]
    fn test_invalid_without_route() {
        let (bug, debs) = fixtures::ready_for_updates(1001);
        debs.remove_route(Pocket::Proposed);
        let mut bug = bug.with_task("boot-testing", TaskStatus::New);

        evaluate(&TestingHandler::boot(), &mut bug, "boot-testing").unwrap();
        assert_eq!(bug.task_status("boot-testing"), Some(TaskStatus::Invalid));
    }

    #[test]
    fn test_failed_tag_marks_incomplete_with_comment() {
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug
            .with_task("certification-testing", TaskStatus::Confirmed)
            .with_tag("certification-testing-failed");

        let result = evaluate(&TestingHandler::certification(), &mut bug, "certification-testing").unwrap();
        assert_eq!(result, Transition::Changed);
        assert_eq!(bug.task_status("certification-testing"), Some(TaskStatus::Incomplete));
        assert_eq!(comments(&bug), vec!["Certification Testing FAILURE".to_string()]);
        assert_eq!(bug.properties.phase.as_deref(), Some("Testing Failed"));

        // Already failed: no second comment.
        evaluate(&TestingHandler::certification(), &mut bug, "certification-testing").unwrap();
        assert_eq!(comments(&bug).len(), 1);
    }

    #[test]
    fn test_regression_accepts_qa_tags() {
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug
            .with_task("regression-testing", TaskStatus::Confirmed)
            .with_tag("qa-testing-passed");

        evaluate(&TestingHandler::regression(), &mut bug, "regression-testing").unwrap();
        assert_eq!(bug.task_status("regression-testing"), Some(TaskStatus::FixReleased));
    }

    #[test]
    fn test_verification_series_tags() {
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug.with_task("verification-testing", TaskStatus::Confirmed);

        evaluate(&TestingHandler::verification(), &mut bug, "verification-testing").unwrap();
        assert_eq!(
            bug.task("verification-testing").unwrap().reason.clone().unwrap().to_string(),
            "Ongoing -- testing in progress"
        );

        bug.add_tag("verification-done-noble");
        evaluate(&TestingHandler::verification(), &mut bug, "verification-testing").unwrap();
        assert_eq!(bug.task_status("verification-testing"), Some(TaskStatus::FixReleased));
    }

    #[test]
    fn test_feed_results_drive_status() {
        let feed = MockTestResults::new();
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug
            .with_task("automated-testing", TaskStatus::Confirmed)
            .with_test_results(Arc::new(feed.clone()));

        feed.set_result("automated-testing", "running");
        evaluate(&TestingHandler::automated(), &mut bug, "automated-testing").unwrap();
        assert_eq!(bug.task_status("automated-testing"), Some(TaskStatus::InProgress));

        feed.set_result("automated-testing", "hinted");
        evaluate(&TestingHandler::automated(), &mut bug, "automated-testing").unwrap();
        assert_eq!(bug.task_status("automated-testing"), Some(TaskStatus::FixReleased));
    }

    #[test]
    fn test_feed_unreachable_is_retryable() {
        let feed = MockTestResults::new();
        feed.set_unreachable(true);
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug
            .with_task("automated-testing", TaskStatus::Confirmed)
            .with_test_results(Arc::new(feed.clone()));

        let err = evaluate(&TestingHandler::automated(), &mut bug, "automated-testing").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_abi_aborts_and_recovers() {
        let (bug, _debs) = fixtures::ready_for_updates(1001);
        let mut bug = bug
            .with_task("prepare-package", TaskStatus::InProgress)
            .with_task("abi-testing", TaskStatus::Confirmed);

        evaluate(&TestingHandler::abi(), &mut bug, "abi-testing").unwrap();
        assert_eq!(bug.task_status("abi-testing"), Some(TaskStatus::Opinion));

        bug.task_mut("prepare-package").unwrap().status = TaskStatus::FixReleased;
        evaluate(&TestingHandler::abi(), &mut bug, "abi-testing").unwrap();
        assert_eq!(bug.task_status("abi-testing"), Some(TaskStatus::New));
    }

    #[test]
    fn test_snap_qa_gated_on_candidate() {
        let mut bug = fixtures::snap_bug(2001)
            .with_task("snap-release-to-candidate", TaskStatus::InProgress)
            .with_task("snap-qa-testing", TaskStatus::New);

        evaluate(&TestingHandler::snap_qa(), &mut bug, "snap-qa-testing").unwrap();
        assert_eq!(bug.task_status("snap-qa-testing"), Some(TaskStatus::New));

        bug.task_mut("snap-release-to-candidate").unwrap().status = TaskStatus::FixReleased;
        evaluate(&TestingHandler::snap_qa(), &mut bug, "snap-qa-testing").unwrap();
        assert_eq!(bug.task_status("snap-qa-testing"), Some(TaskStatus::Confirmed));
    }
}
