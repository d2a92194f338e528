//! Testing utilities and mock providers.
//!
//! The mocks wrap the static `*State` providers behind shared locks so a
//! test can change the world between cranks without rebuilding the bug.
//!
//! # Example
//!
//! ```rust,ignore
//! use swm_core::testing::{fixtures, MockDebs};
//!
//! let (mut bug, debs) = fixtures::ready_for_updates(1001);
//! debs.set_publish_state(Pocket::Updates, PublishState::Published);
//! engine.crank(&mut bug, fixtures::now())?;
//! ```

mod mock_debs;
mod mock_snap;
mod mock_test_results;

pub use mock_debs::{MockDebs, RecordedCopy};
pub use mock_snap::MockSnap;
pub use mock_test_results::MockTestResults;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::MockDebs;
    use crate::bug::{Bug, BugId, TaskStatus, Variant};
    use crate::providers::{Pocket, PublishState, SwmConfig, Window};

    /// Cycle every fixture bug belongs to.
    pub const CYCLE: &str = "2024.03.04";

    fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Wednesday 2024-03-06 12:00 UTC: outside every hold window.
    pub fn now() -> DateTime<Utc> {
        at(2024, 3, 6, 12)
    }

    /// Saturday 2024-03-09 12:00 UTC, inside the weekend hold.
    pub fn saturday() -> DateTime<Utc> {
        at(2024, 3, 9, 12)
    }

    /// Policy with [`CYCLE`] released and no windows.
    pub fn ready_policy() -> SwmConfig {
        SwmConfig {
            ready_cycles: [CYCLE.to_string()].into_iter().collect(),
            ..SwmConfig::default()
        }
    }

    /// Ready policy with a deployment blackout a day either side of `now`.
    pub fn blackout_policy(now: DateTime<Utc>) -> SwmConfig {
        SwmConfig {
            deployment_blackout: vec![Window {
                start: now - Duration::days(1),
                end: now + Duration::days(1),
            }],
            ..ready_policy()
        }
    }

    /// A stable-series debs tracker with only its workflow task and no
    /// providers attached.
    pub fn sru_bug(id: BugId) -> Bug {
        let mut bug = Bug::new(id, "noble", "linux", Arc::new(ready_policy()));
        bug.version = Some("6.8.0-50.51".to_string());
        bug.cycle = Some(CYCLE.to_string());
        bug.with_task("kernel-sru-workflow", TaskStatus::InProgress)
    }

    /// A snap tracker with the full snap task ladder, all New.
    pub fn snap_bug(id: BugId) -> Bug {
        let mut bug = Bug::new(id, "noble", "pc-kernel", Arc::new(ready_policy()));
        bug.variant = Variant::SnapDebs;
        bug.version = Some("6.8.0-50.51".to_string());
        bug.cycle = Some(CYCLE.to_string());
        bug.with_task("kernel-sru-workflow", TaskStatus::InProgress)
            .with_task("snap-prepare", TaskStatus::New)
            .with_task("snap-release-to-edge", TaskStatus::New)
            .with_task("snap-release-to-beta", TaskStatus::New)
            .with_task("snap-release-to-candidate", TaskStatus::New)
            .with_task("snap-release-to-stable", TaskStatus::New)
            .with_task("snap-certification-testing", TaskStatus::New)
            .with_task("snap-qa-testing", TaskStatus::New)
            .with_task("snap-publish", TaskStatus::New)
    }

    /// Archive ready for a new spin: `main` and `meta` components, routed
    /// through the PPA to -proposed, nothing built yet.
    pub fn debs_for_packaging() -> MockDebs {
        let debs = MockDebs::new();
        for component in ["main", "meta"] {
            debs.set_component_uploaded(component, false, None);
        }
        debs.set_ready_to_prepare(true);
        debs.add_route(Pocket::Ppa);
        debs.add_route(Pocket::Proposed);
        debs
    }

    /// Packages built and published in -proposed with the production
    /// pockets routed.
    pub fn debs_in_proposed() -> MockDebs {
        let debs = MockDebs::new();
        debs.set_component_uploaded("main", true, Some("kernel-hacker"));
        debs.set_component_tag_published("main", true);
        for pocket in [Pocket::Ppa, Pocket::Proposed, Pocket::Updates, Pocket::Security] {
            debs.add_route(pocket);
        }
        debs.set_built(Pocket::Ppa, true);
        debs.set_built(Pocket::Proposed, true);
        debs.set_publish_state(Pocket::Proposed, PublishState::Published);
        debs.set_packages(Pocket::Proposed, &["linux", "linux-meta", "linux-signed"]);
        debs
    }

    /// A tracker sitting in -proposed with testing and sign-offs done,
    /// waiting to be promoted to -updates and -security.
    pub fn ready_for_updates(id: BugId) -> (Bug, MockDebs) {
        let debs = debs_in_proposed();
        let mut bug = sru_bug(id).with_debs(Arc::new(debs.clone()));
        for task in [
            "prepare-package",
            ":prepare-packages",
            "promote-to-proposed",
            "automated-testing",
            "boot-testing",
            "certification-testing",
            "regression-testing",
            "verification-testing",
            "kernel-signoff",
            "security-signoff",
            "stakeholder-signoff",
        ] {
            bug = bug.with_task(task, TaskStatus::FixReleased);
        }
        let bug = bug
            .with_task("promote-to-updates", TaskStatus::New)
            .with_task("promote-to-security", TaskStatus::New);
        (bug, debs)
    }
}
