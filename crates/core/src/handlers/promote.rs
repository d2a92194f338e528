//! Pocket promotion handlers: promote-to-proposed, promote-signing-to-proposed,
//! promote-to-updates, promote-to-security and promote-to-release.

use chrono::Duration;
use tracing::info;

use super::context::TaskContext;
use super::error::TaskError;
use super::promoter::{MasterRequirement, Promoter, Readiness, MASTER_DONE, MASTER_READY};
use super::{TaskHandler, Transition};
use crate::bug::{Reason, TaskStatus};
use crate::providers::{DebsProvider, Pocket, PublishState};

const PROPOSED_MASTER: &[MasterRequirement] = &[("promote-to-proposed", MASTER_READY)];
const UPDATES_MASTER: &[MasterRequirement] = &[
    ("promote-to-proposed", MASTER_DONE),
    ("promote-to-updates", MASTER_READY),
];
const SECURITY_MASTER: &[MasterRequirement] = &[
    ("promote-to-updates", MASTER_DONE),
    ("promote-to-security", MASTER_READY),
];
const RELEASE_MASTER: &[MasterRequirement] = &[
    ("promote-to-proposed", MASTER_DONE),
    ("promote-to-release", MASTER_READY),
];

const SNAP_TESTING_TASKS: [&str; 2] = ["snap-certification-testing", "snap-qa-testing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromoteKind {
    Proposed,
    SigningToProposed,
    Updates,
    Security,
    Release,
}

impl PromoteKind {
    pub fn source(&self) -> Pocket {
        match self {
            PromoteKind::Proposed => Pocket::Ppa,
            PromoteKind::SigningToProposed => Pocket::Signing,
            PromoteKind::Updates | PromoteKind::Release => Pocket::Proposed,
            PromoteKind::Security => Pocket::Updates,
        }
    }

    pub fn destination(&self) -> Pocket {
        match self {
            PromoteKind::Proposed | PromoteKind::SigningToProposed => Pocket::Proposed,
            PromoteKind::Updates => Pocket::Updates,
            PromoteKind::Security => Pocket::Security,
            PromoteKind::Release => Pocket::Release,
        }
    }

    /// Pocket that must be routed for the task to make sense at all.
    fn route(&self) -> Pocket {
        match self {
            PromoteKind::SigningToProposed => Pocket::Signing,
            _ => self.destination(),
        }
    }

    fn master_requirements(&self) -> &'static [MasterRequirement] {
        match self {
            PromoteKind::Proposed | PromoteKind::SigningToProposed => PROPOSED_MASTER,
            PromoteKind::Updates => UPDATES_MASTER,
            PromoteKind::Security => SECURITY_MASTER,
            PromoteKind::Release => RELEASE_MASTER,
        }
    }
}

/// What the pocket-specific pre-checks decided.
enum Upstream {
    Ready,
    Hold(Reason),
    Invalid(String),
}

pub struct PromoteHandler {
    kind: PromoteKind,
    promoter: Promoter,
}

impl PromoteHandler {
    pub fn new(kind: PromoteKind) -> Self {
        let promoter = Promoter::new(kind.source(), kind.destination())
            .with_master_requirements(kind.master_requirements());
        Self { kind, promoter }
    }

    pub fn promoter(&self) -> &Promoter {
        &self.promoter
    }

    fn new_task(&self, ctx: &mut TaskContext<'_>) -> Result<Transition, TaskError> {
        let debs = ctx.debs()?;

        let upstream = if debs.has_route(self.kind.route()) {
            self.upstream(ctx)?
        } else {
            Upstream::Invalid(format!("no {} route", self.kind.route()))
        };

        match upstream {
            Upstream::Invalid(why) => {
                info!("Bug {} {}: {}, marking Invalid", ctx.bug.id, ctx.task_name(), why);
                ctx.set_status(TaskStatus::Invalid);
                return Ok(ctx.outcome());
            }
            Upstream::Hold(reason) => {
                ctx.set_reason(reason);
                return Ok(ctx.outcome());
            }
            Upstream::Ready => {}
        }

        match self.promoter.readiness(ctx)? {
            Readiness::NotReady(reason) => ctx.set_reason(reason),
            Readiness::Ready => {
                let delta = debs.delta(self.promoter.source, self.promoter.destination);
                let task = ctx.task_name().to_string();
                ctx.bug.properties.delta.insert(task, delta);
                ctx.set_status(TaskStatus::Confirmed);
                ctx.timestamp("started");
                ctx.set_reason(Reason::pending(format!(
                    "ready to copy to {}",
                    self.promoter.destination
                )));
            }
        }
        Ok(ctx.outcome())
    }

    /// Pocket-specific upstream conditions, checked before the shared policy.
    fn upstream(&self, ctx: &mut TaskContext<'_>) -> Result<Upstream, TaskError> {
        match self.kind {
            PromoteKind::Proposed | PromoteKind::SigningToProposed => Ok(packaging_done(ctx)),
            PromoteKind::Release => Ok(proposed_done(ctx)),
            PromoteKind::Updates => {
                let proposed = proposed_done(ctx);
                if !matches!(proposed, Upstream::Ready) {
                    return Ok(proposed);
                }
                Ok(snap_testing_done(ctx))
            }
            PromoteKind::Security => self.security_upstream(ctx),
        }
    }

    fn security_upstream(&self, ctx: &mut TaskContext<'_>) -> Result<Upstream, TaskError> {
        let signoff = ctx.require_task("security-signoff")?;
        if signoff == TaskStatus::Invalid {
            return Ok(Upstream::Invalid("security-signoff is Invalid".to_string()));
        }

        let updates = ctx.require_task("promote-to-updates")?;
        if updates != TaskStatus::FixReleased {
            return Ok(Upstream::Hold(Reason::holding(
                "waiting for promote-to-updates",
            )));
        }

        let finished = ctx
            .bug
            .properties
            .timestamp("promote-to-updates", "finished")
            .or_else(|| ctx.bug.task("promote-to-updates").and_then(|t| t.status_since));
        if let Some(finished) = finished {
            let ready_at =
                finished + Duration::minutes(i64::from(ctx.config.promotion.security_dwell_minutes));
            if ctx.now < ready_at {
                ctx.bug.refresh_at(ready_at, "security dwell");
                return Ok(Upstream::Hold(Reason::holding(format!(
                    "waiting for -updates to replicate until {}",
                    ready_at.format("%Y-%m-%d %H:%M")
                ))));
            }
        }

        if signoff != TaskStatus::FixReleased {
            return Ok(Upstream::Hold(Reason::holding(format!(
                "waiting for security-signoff ({})",
                signoff
            ))));
        }
        Ok(Upstream::Ready)
    }

    fn verify_promotion(
        &self,
        status: TaskStatus,
        ctx: &mut TaskContext<'_>,
    ) -> Result<Transition, TaskError> {
        let debs = ctx.debs()?;
        let destination = self.promoter.destination;

        // Once the copy has been requested only master gating can hold it.
        if status != TaskStatus::FixCommitted {
            if let Some(reason) = self.promoter.holds(ctx) {
                ctx.pull_back(reason);
                return Ok(ctx.outcome());
            }
        }

        match self.promoter.publication(debs.as_ref()) {
            PublishState::Absent => {
                let reason = match status {
                    TaskStatus::Confirmed => {
                        Reason::pending(format!("ready to copy to {}", destination))
                    }
                    TaskStatus::FixCommitted => {
                        Reason::ongoing(format!("packages not yet published in {}", destination))
                    }
                    _ => Reason::ongoing(format!("copy to {} in progress", destination)),
                };
                ctx.set_reason(reason);
            }
            PublishState::Partial => {
                ctx.set_status(TaskStatus::FixCommitted);
                ctx.set_reason(Reason::ongoing(format!(
                    "packages partially published in {}",
                    destination
                )));
            }
            PublishState::Published => {
                if !debs.components_correct(destination) {
                    ctx.set_reason(Reason::stalled(format!(
                        "packages published to the wrong components in {}",
                        destination
                    )));
                } else if let Some(reason) = self.promoter.master_gate(ctx) {
                    ctx.set_status(TaskStatus::FixCommitted);
                    ctx.set_reason(reason);
                } else {
                    self.released(ctx, debs.as_ref());
                }
            }
        }
        Ok(ctx.outcome())
    }

    fn released(&self, ctx: &mut TaskContext<'_>, debs: &dyn DebsProvider) {
        let destination = self.promoter.destination;
        info!(
            "Bug {} all components are now in {}",
            ctx.bug.id, destination
        );
        ctx.set_status(TaskStatus::FixReleased);
        ctx.timestamp("finished");
        ctx.set_phase(&format!("Promoted to {}", destination.title()));

        if destination == Pocket::Proposed {
            let tag = format!("verification-needed-{}", ctx.bug.series);
            ctx.bug.add_tag(&tag);
        }

        if ctx.bug.properties.announce(&format!("{}-announcement", destination)) {
            let version = ctx.bug.version.clone().unwrap_or_default();
            let subject = format!(
                "[{}] {} {} available in {}",
                ctx.bug.series, ctx.bug.source, version, destination
            );
            let mut body = format!(
                "{} {} for {} has been published to -{}.\n",
                ctx.bug.source, version, ctx.bug.series, destination
            );
            let delta = debs.delta(self.promoter.source, destination);
            if !delta.is_empty() {
                body.push_str(&format!("\nStill pending: {}\n", delta.join(", ")));
            }
            ctx.bug.send_email(&subject, &body, None);
            ctx.bug.add_comment("Packages available", &body);
        }
    }
}

impl TaskHandler for PromoteHandler {
    fn name(&self) -> &'static str {
        match self.kind {
            PromoteKind::Proposed => "promote-to-proposed",
            PromoteKind::SigningToProposed => "promote-signing-to-proposed",
            PromoteKind::Updates => "promote-to-updates",
            PromoteKind::Security => "promote-to-security",
            PromoteKind::Release => "promote-to-release",
        }
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
            | TaskStatus::FixCommitted => self.verify_promotion(status, ctx),
            _ => Ok(Transition::Unmapped),
        }
    }
}

// ============================================================================
// Upstream checks
// ============================================================================

fn hold_on(name: &str, status: TaskStatus) -> Upstream {
    Upstream::Hold(Reason::holding(format!("waiting for {} ({})", name, status)))
}

/// Packaging and source review are finished.
fn packaging_done(ctx: &TaskContext<'_>) -> Upstream {
    match ctx.task_status(":prepare-packages") {
        Some(TaskStatus::FixReleased) => {}
        Some(status) => return hold_on(":prepare-packages", status),
        None => {
            let pending = ctx
                .bug
                .tasks
                .values()
                .filter(|task| task.name.starts_with("prepare-package"))
                .find(|task| !task.status.is_terminal());
            if let Some(task) = pending {
                return hold_on(&task.name, task.status);
            }
        }
    }

    for review in ["sru-review", "new-review"] {
        if let Some(status) = ctx.task_status(review) {
            if !status.is_terminal() {
                return hold_on(review, status);
            }
        }
    }
    Upstream::Ready
}

/// The packages reached -proposed through whichever route the bug uses.
fn proposed_done(ctx: &TaskContext<'_>) -> Upstream {
    let signing = ctx.task_status("promote-signing-to-proposed");
    let (name, status) = match signing {
        Some(status) if status != TaskStatus::Invalid => ("promote-signing-to-proposed", status),
        _ => match ctx.task_status("promote-to-proposed") {
            Some(status) => ("promote-to-proposed", status),
            None => return Upstream::Ready,
        },
    };
    if status == TaskStatus::FixReleased {
        Upstream::Ready
    } else {
        hold_on(name, status)
    }
}

/// Active snap testing on a combo bug holds the debs back from -updates.
fn snap_testing_done(ctx: &TaskContext<'_>) -> Upstream {
    for name in SNAP_TESTING_TASKS {
        if let Some(status) = ctx.task_status(name) {
            if status.is_active() || status == TaskStatus::Incomplete {
                return Upstream::Hold(Reason::holding(format!("{} is not complete", name)));
            }
        }
    }
    Upstream::Ready
}
