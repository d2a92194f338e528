//! Shared readiness policy for tasks that copy packages between pockets.
//!
//! The checks run in a fixed order and the first failing one supplies the
//! task reason:
//!
//! 1. build artifacts ready in the source pocket (or nothing left to copy)
//! 2. companion packages present
//! 3. testing complete (production pockets, unless `testing-override`)
//! 4. no manual block tag
//! 5. outside blackout/freeze/weekend windows (unless `kernel-release-override`)
//! 6. release cycle ready (unless development series or `kernel-unblock-cycle`)
//! 7. sign-offs complete (production pockets)
//! 8. master bug in a qualifying state (derivatives only)
//! 9. no older tracker still active in the destination
//!
//! Upstream-stage checks are pocket specific and live with the individual
//! promotion handlers.

use tracing::debug;

use super::context::TaskContext;
use super::error::TaskError;
use crate::bug::{MonitorRecord, Reason, TaskStatus};
use crate::providers::{
    failures_to_text, in_weekend_hold, DebsProvider, Pocket, PublishState,
};

pub const TESTING_TASKS: [&str; 5] = [
    "automated-testing",
    "boot-testing",
    "certification-testing",
    "regression-testing",
    "verification-testing",
];

pub const SIGNOFF_TASKS: [&str; 3] = ["kernel-signoff", "security-signoff", "stakeholder-signoff"];

pub const TESTING_OVERRIDE_TAG: &str = "testing-override";
pub const RELEASE_OVERRIDE_TAG: &str = "kernel-release-override";
pub const UNBLOCK_CYCLE_TAG: &str = "kernel-unblock-cycle";
pub const BLOCK_TAG: &str = "kernel-block";

/// Statuses of a master task that let a derivative proceed.
pub type MasterRequirement = (&'static str, &'static [TaskStatus]);

pub const MASTER_READY: &[TaskStatus] = &[
    TaskStatus::Confirmed,
    TaskStatus::Triaged,
    TaskStatus::InProgress,
    TaskStatus::FixCommitted,
    TaskStatus::FixReleased,
    TaskStatus::Invalid,
];

pub const MASTER_DONE: &[TaskStatus] = &[TaskStatus::FixReleased, TaskStatus::Invalid];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    NotReady(Reason),
}

/// Promotion policy for one source/destination pocket pair.
#[derive(Debug, Clone)]
pub struct Promoter {
    pub source: Pocket,
    pub destination: Pocket,
    pub gate_testing: bool,
    pub gate_signoffs: bool,
    pub gate_cycle: bool,
    pub master_requirements: &'static [MasterRequirement],
}

impl Promoter {
    pub fn new(source: Pocket, destination: Pocket) -> Self {
        let production = destination.is_production();
        Self {
            source,
            destination,
            gate_testing: production,
            gate_signoffs: production,
            gate_cycle: matches!(destination, Pocket::Updates | Pocket::Security),
            master_requirements: &[],
        }
    }

    pub fn with_master_requirements(mut self, requirements: &'static [MasterRequirement]) -> Self {
        self.master_requirements = requirements;
        self
    }

    /// Run every readiness check; the first failure wins.
    pub fn readiness(&self, ctx: &mut TaskContext<'_>) -> Result<Readiness, TaskError> {
        let debs = ctx.debs()?;

        let blocking = self
            .artifacts_ready(debs.as_ref())
            .or_else(|| self.companions_present(ctx, debs.as_ref()))
            .or_else(|| self.testing_complete(ctx))
            .or_else(|| self.holds(ctx))
            .or_else(|| self.signoffs_complete(ctx));
        if let Some(reason) = blocking {
            return Ok(Readiness::NotReady(reason));
        }

        if let Some(reason) = self.older_tracker(ctx, debs.as_ref()) {
            return Ok(Readiness::NotReady(reason));
        }

        Ok(Readiness::Ready)
    }

    /// Conditions that must keep holding while a promotion is in flight:
    /// manual blocks, windows, cycle readiness and master gating.
    pub fn holds(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        self.manual_block(ctx)
            .or_else(|| self.window_hold(ctx))
            .or_else(|| self.cycle_hold(ctx))
            .or_else(|| self.master_gate(ctx))
    }

    pub fn artifacts_ready(&self, debs: &dyn DebsProvider) -> Option<Reason> {
        if debs.all_built_in_pocket(self.source) {
            return None;
        }
        if debs.delta(self.source, self.destination).is_empty()
            && debs.all_built_and_in_pocket_or_after(self.destination)
        {
            return None;
        }

        let failures = debs.build_failures(self.source);
        if failures.iter().any(|f| !f.state.is_transient()) {
            return Some(Reason::stalled(format!(
                "build FAILED in {} ({})",
                self.source,
                failures_to_text(&failures)
            )));
        }
        if !failures.is_empty() {
            return Some(Reason::ongoing(format!(
                "building in {} ({})",
                self.source,
                failures_to_text(&failures)
            )));
        }
        Some(Reason::holding(format!(
            "packages not yet built in {}",
            self.source
        )))
    }

    pub fn companions_present(
        &self,
        ctx: &TaskContext<'_>,
        debs: &dyn DebsProvider,
    ) -> Option<Reason> {
        let missing: Vec<String> = ctx
            .policy()
            .required_companions(&ctx.bug.source)
            .into_iter()
            .filter(|package| {
                !std::iter::once(&self.destination)
                    .chain(self.destination.after())
                    .any(|pocket| debs.package_present(package, *pocket))
            })
            .collect();
        if missing.is_empty() {
            return None;
        }
        Some(Reason::holding(format!(
            "waiting for companion packages in {}: {}",
            self.destination,
            missing.join(", ")
        )))
    }

    pub fn testing_complete(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        if !self.gate_testing || ctx.has_tag(TESTING_OVERRIDE_TAG) {
            return None;
        }
        let pending: Vec<String> = TESTING_TASKS
            .iter()
            .filter_map(|name| ctx.task_status(name).map(|status| (name, status)))
            .filter(|(_, status)| !status.is_complete())
            .map(|(name, status)| format!("{}: {}", name, status))
            .collect();
        if pending.is_empty() {
            return None;
        }
        Some(Reason::holding(format!(
            "waiting for testing ({})",
            pending.join(", ")
        )))
    }

    pub fn manual_block(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        let specific = self.destination.block_tag();
        ctx.bug
            .block_present(&[BLOCK_TAG, specific.as_str()])
            .map(|tag| Reason::stalled(format!("blocked via {}", tag)))
    }

    pub fn window_hold(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        if ctx.has_tag(RELEASE_OVERRIDE_TAG) {
            return None;
        }
        let policy = ctx.policy();
        if self.destination.is_production() && policy.in_blackout(ctx.now) {
            return Some(Reason::holding("in deployment blackout"));
        }
        if ctx.bug.development_series
            && matches!(self.destination, Pocket::Proposed | Pocket::Release)
            && policy.in_freeze(ctx.now)
        {
            return Some(Reason::holding("in development freeze"));
        }
        if ctx.config.promotion.weekend_hold
            && matches!(self.destination, Pocket::Updates | Pocket::Security)
            && in_weekend_hold(ctx.now)
        {
            return Some(Reason::holding("weekend publishing hold"));
        }
        None
    }

    pub fn cycle_hold(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        if !self.gate_cycle || ctx.bug.development_series || ctx.has_tag(UNBLOCK_CYCLE_TAG) {
            return None;
        }
        let Some(cycle) = ctx.bug.cycle.as_deref() else {
            return Some(Reason::holding("cycle unknown"));
        };
        if ctx.policy().cycle_ready(cycle) {
            return None;
        }
        Some(Reason::holding(format!("cycle not ready ({})", cycle)))
    }

    pub fn signoffs_complete(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        if !self.gate_signoffs {
            return None;
        }
        let pending: Vec<String> = SIGNOFF_TASKS
            .iter()
            .filter_map(|name| ctx.task_status(name).map(|status| (name, status)))
            .filter(|(_, status)| !status.is_terminal())
            .map(|(name, status)| format!("{}: {}", name, status))
            .collect();
        if pending.is_empty() {
            return None;
        }
        Some(Reason::holding(format!(
            "waiting for signoff ({})",
            pending.join(", ")
        )))
    }

    /// Derivatives follow their master. A master that cannot be read is
    /// "not yet knowable" and holds the promotion.
    pub fn master_gate(&self, ctx: &TaskContext<'_>) -> Option<Reason> {
        let link = ctx.bug.master.as_ref()?;
        let Some(master) = link.view.as_ref() else {
            debug!(
                "Bug {} master bug {} not available",
                ctx.bug.id, link.id
            );
            return Some(Reason::holding(format!(
                "master bug {} not available",
                link.id
            )));
        };

        for (task, qualifying) in self.master_requirements {
            let Some(status) = master.task_status(task) else {
                continue;
            };
            if !qualifying.contains(&status) {
                return Some(Reason::holding(format!(
                    "master bug {} {} is {}",
                    link.id, task, status
                )));
            }
        }
        None
    }

    pub fn older_tracker(
        &self,
        ctx: &mut TaskContext<'_>,
        debs: &dyn DebsProvider,
    ) -> Option<Reason> {
        let older = debs.older_tracker_in_pocket(self.destination)?;
        ctx.bug
            .monitor_add(MonitorRecord::TrackerModified { watch: older });
        Some(Reason::stalled(format!(
            "tracker for earlier spin {} still active in {}",
            older, self.destination
        )))
    }

    /// Publication state in the destination, counting packages that have
    /// already moved on to a later pocket as published.
    pub fn publication(&self, debs: &dyn DebsProvider) -> PublishState {
        match debs.publish_state(self.destination) {
            PublishState::Absent
                if self
                    .destination
                    .after()
                    .iter()
                    .any(|pocket| debs.publish_state(*pocket) == PublishState::Published) =>
            {
                PublishState::Published
            }
            state => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::testing::fixtures;
    use std::sync::Arc;

    fn updates() -> Promoter {
        Promoter::new(Pocket::Proposed, Pocket::Updates)
    }

    #[test]
    fn test_manual_block_is_stalled() {
        let mut bug = fixtures::sru_bug(1001).with_tag("kernel-block-updates");
        let config = EngineConfig::default();
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);

        let reason = updates().manual_block(&ctx).unwrap();
        assert_eq!(reason.to_string(), "Stalled -- blocked via kernel-block-updates");
    }

    #[test]
    fn test_block_for_other_pocket_is_ignored() {
        let mut bug = fixtures::sru_bug(1001).with_tag("kernel-block-proposed");
        let config = EngineConfig::default();
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().manual_block(&ctx).is_none());
    }

    #[test]
    fn test_testing_override() {
        let mut bug = fixtures::sru_bug(1001)
            .with_task("automated-testing", TaskStatus::InProgress);
        let config = EngineConfig::default();
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
            let reason = updates().testing_complete(&ctx).unwrap();
            assert!(reason.text.contains("automated-testing: In Progress"));
        }
        bug.add_tag(TESTING_OVERRIDE_TAG);
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().testing_complete(&ctx).is_none());
    }

    #[test]
    fn test_wont_fix_testing_counts_as_complete() {
        let mut bug = fixtures::sru_bug(1001)
            .with_task("certification-testing", TaskStatus::WontFix);
        let config = EngineConfig::default();
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().testing_complete(&ctx).is_none());
    }

    #[test]
    fn test_cycle_hold_and_overrides() {
        let mut bug = fixtures::sru_bug(1001);
        bug.cycle = Some("2099.01.01".to_string());
        let config = EngineConfig::default();
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
            let reason = updates().cycle_hold(&ctx).unwrap();
            assert!(reason.text.contains("cycle not ready"));
        }
        bug.add_tag(UNBLOCK_CYCLE_TAG);
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
            assert!(updates().cycle_hold(&ctx).is_none());
        }
        bug.remove_tag(UNBLOCK_CYCLE_TAG);
        bug.development_series = true;
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().cycle_hold(&ctx).is_none());
    }

    #[test]
    fn test_missing_cycle_holds() {
        let mut bug = fixtures::sru_bug(1001);
        bug.cycle = None;
        let config = EngineConfig::default();
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
            let reason = updates().cycle_hold(&ctx).unwrap();
            assert_eq!(reason.to_string(), "Holding -- cycle unknown");
        }
        bug.add_tag(UNBLOCK_CYCLE_TAG);
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().cycle_hold(&ctx).is_none());
    }

    #[test]
    fn test_blackout_and_override() {
        let mut bug = fixtures::sru_bug(1001);
        bug.policy = Arc::new(fixtures::blackout_policy(fixtures::now()));
        let config = EngineConfig::default();
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
            let reason = updates().window_hold(&ctx).unwrap();
            assert_eq!(reason.text, "in deployment blackout");

            let proposed = Promoter::new(Pocket::Ppa, Pocket::Proposed);
            assert!(proposed.window_hold(&ctx).is_none());
        }
        bug.add_tag(RELEASE_OVERRIDE_TAG);
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        assert!(updates().window_hold(&ctx).is_none());
    }

    #[test]
    fn test_weekend_hold_only_when_enabled() {
        // fixtures::saturday() falls inside the weekend window.
        let mut bug = fixtures::sru_bug(1001);
        let mut config = EngineConfig::default();
        {
            let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::saturday(), &config);
            assert!(updates().window_hold(&ctx).is_none());
        }
        config.promotion.weekend_hold = true;
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::saturday(), &config);
        assert_eq!(
            updates().window_hold(&ctx).unwrap().text,
            "weekend publishing hold"
        );
    }

    #[test]
    fn test_master_unreachable_holds() {
        let mut bug = fixtures::sru_bug(1001).with_master(900, None);
        let config = EngineConfig::default();
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);
        let reason = updates().master_gate(&ctx).unwrap();
        assert_eq!(reason.text, "master bug 900 not available");
    }

    #[test]
    fn test_master_requirements() {
        const REQUIREMENTS: &[MasterRequirement] = &[("promote-to-updates", MASTER_READY)];
        let master = fixtures::sru_bug(900).with_task("promote-to-updates", TaskStatus::New);
        let mut bug = fixtures::sru_bug(1001).with_master(900, Some(Arc::new(master)));
        let config = EngineConfig::default();
        let ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);

        let promoter = updates().with_master_requirements(REQUIREMENTS);
        let reason = promoter.master_gate(&ctx).unwrap();
        assert_eq!(reason.text, "master bug 900 promote-to-updates is New");
    }

    #[test]
    fn test_older_tracker_adds_monitor() {
        let debs = fixtures::debs_in_proposed();
        debs.set_older_tracker(Pocket::Updates, Some(777));
        let mut bug = fixtures::sru_bug(1001);
        bug.debs = Some(Arc::new(debs.clone()));
        let config = EngineConfig::default();
        let mut ctx = TaskContext::new(&mut bug, "promote-to-updates", fixtures::now(), &config);

        let reason = updates().older_tracker(&mut ctx, &debs).unwrap();
        assert!(reason.text.contains("earlier spin 777"));
        assert_eq!(bug.events.len(), 1);
    }
}
