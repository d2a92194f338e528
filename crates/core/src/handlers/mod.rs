//! Per-task state machines.
//!
//! Each workflow task name maps to a [`TaskHandler`]. Handlers are stateless:
//! everything they know comes from the bug and its providers, and everything
//! they change goes through the [`TaskContext`].

mod context;
mod error;
mod ignore;
mod prepare_package;
mod promote;
mod promoter;
mod review;
mod signing_jobs;
mod signoff;
mod snap;
mod synthetic;
mod testing;
mod workflow;

pub use context::TaskContext;
pub use error::TaskError;
pub use ignore::IgnoreInvalid;
pub use prepare_package::PreparePackage;
pub use promote::{PromoteHandler, PromoteKind};
pub use promoter::{Promoter, Readiness};
pub use review::SourceReview;
pub use signing_jobs::CanonicalSigningJobs;
pub use signoff::Signoff;
pub use snap::{SnapPrepare, SnapPublish, SnapRelease};
pub use synthetic::{SynPreparePackages, SynPromoteToAsProposed};
pub use testing::{StartGate, TestingHandler};
pub use workflow::Workflow;

use crate::bug::TaskStatus;
use crate::providers::SnapRisk;

/// Result of evaluating one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The handler moved the task to a new status.
    Changed,
    /// The handler looked and decided nothing should move.
    Unchanged,
    /// The handler has no behaviour for the current status.
    Unmapped,
}

/// A state machine bound to one kind of workflow task.
pub trait TaskHandler: Send + Sync {
    /// Short handler name for logs.
    fn name(&self) -> &'static str;

    /// Dispatch on `status` and apply whatever transition is due.
    fn evaluate(&self, status: TaskStatus, ctx: &mut TaskContext<'_>)
        -> Result<Transition, TaskError>;
}

/// Task names the aggregator handler answers to.
pub const WORKFLOW_TASKS: [&str; 2] = ["kernel-sru-workflow", "kernel-development-workflow"];

/// Look up the handler for a task name.
pub fn handler_for(task: &str) -> Option<Box<dyn TaskHandler>> {
    let handler: Box<dyn TaskHandler> = match task {
        "kernel-sru-workflow" | "kernel-development-workflow" => Box::new(Workflow),

        "prepare-package" => Box::new(PreparePackage::new("main")),
        _ if task.starts_with("prepare-package-") => {
            Box::new(PreparePackage::new(&task["prepare-package-".len()..]))
        }
        ":prepare-packages" => Box::new(SynPreparePackages),
        ":promote-to-as-proposed" => Box::new(SynPromoteToAsProposed),

        "automated-testing" => Box::new(TestingHandler::automated()),
        "certification-testing" => Box::new(TestingHandler::certification()),
        "regression-testing" => Box::new(TestingHandler::regression()),
        "boot-testing" => Box::new(TestingHandler::boot()),
        "verification-testing" => Box::new(TestingHandler::verification()),
        "abi-testing" => Box::new(TestingHandler::abi()),
        "snap-qa-testing" => Box::new(TestingHandler::snap_qa()),
        "snap-certification-testing" => Box::new(TestingHandler::snap_certification()),

        "promote-to-proposed" => Box::new(PromoteHandler::new(PromoteKind::Proposed)),
        "promote-signing-to-proposed" => {
            Box::new(PromoteHandler::new(PromoteKind::SigningToProposed))
        }
        "promote-to-updates" => Box::new(PromoteHandler::new(PromoteKind::Updates)),
        "promote-to-security" => Box::new(PromoteHandler::new(PromoteKind::Security)),
        "promote-to-release" => Box::new(PromoteHandler::new(PromoteKind::Release)),

        "security-signoff" => Box::new(Signoff::security()),
        "stakeholder-signoff" => Box::new(Signoff::stakeholder()),
        "kernel-signoff" => Box::new(Signoff::kernel()),

        "sru-review" | "new-review" => Box::new(SourceReview),
        "canonical-signing-jobs" => Box::new(CanonicalSigningJobs),

        "snap-prepare" => Box::new(SnapPrepare),
        "snap-release-to-edge" => Box::new(SnapRelease::new(SnapRisk::Edge)),
        "snap-release-to-beta" => Box::new(SnapRelease::new(SnapRisk::Beta)),
        "snap-release-to-candidate" => Box::new(SnapRelease::new(SnapRisk::Candidate)),
        "snap-release-to-stable" => Box::new(SnapRelease::new(SnapRisk::Stable)),
        "snap-publish" => Box::new(SnapPublish),

        "upload-to-ppa-dnu" => Box::new(IgnoreInvalid),

        _ => return None,
    };
    Some(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_covers_known_tasks() {
        for task in [
            "kernel-sru-workflow",
            "kernel-development-workflow",
            "prepare-package",
            "prepare-package-meta",
            "prepare-package-signed",
            ":prepare-packages",
            ":promote-to-as-proposed",
            "automated-testing",
            "certification-testing",
            "regression-testing",
            "boot-testing",
            "verification-testing",
            "abi-testing",
            "promote-to-proposed",
            "promote-signing-to-proposed",
            "promote-to-updates",
            "promote-to-security",
            "promote-to-release",
            "security-signoff",
            "stakeholder-signoff",
            "kernel-signoff",
            "sru-review",
            "new-review",
            "canonical-signing-jobs",
            "snap-prepare",
            "snap-release-to-edge",
            "snap-release-to-beta",
            "snap-release-to-candidate",
            "snap-release-to-stable",
            "snap-qa-testing",
            "snap-certification-testing",
            "snap-publish",
            "upload-to-ppa-dnu",
        ] {
            assert!(handler_for(task).is_some(), "no handler for {}", task);
        }
    }

    #[test]
    fn test_registry_rejects_unknown() {
        assert!(handler_for("make-coffee").is_none());
        assert!(handler_for("").is_none());
    }

    #[test]
    fn test_prepare_package_component_names() {
        let handler = handler_for("prepare-package-lrm").unwrap();
        assert_eq!(handler.name(), "prepare-package");
    }
}
