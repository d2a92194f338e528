//! Archive package status provider.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::pocket::Pocket;
use crate::bug::BugId;

/// Publication state of the packages of one tracker in one pocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    #[default]
    Absent,
    /// Some packages published, others still pending.
    Partial,
    Published,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Building,
    DepWait,
    FailWait,
    Failed,
    Missing,
}

impl BuildState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildState::Building => "building",
            BuildState::DepWait => "depwait",
            BuildState::FailWait => "failwait",
            BuildState::Failed => "failed",
            BuildState::Missing => "missing",
        }
    }

    /// Still expected to resolve on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BuildState::Building | BuildState::DepWait | BuildState::FailWait
        )
    }
}

/// A package in a pocket that is not yet cleanly built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFailure {
    pub package: String,
    pub state: BuildState,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.package, self.state.as_str())
    }
}

/// Render a failure list as `main:building, meta:failed`.
pub fn failures_to_text(failures: &[BuildFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("copy from {from} to {to} failed: {detail}")]
pub struct CopyError {
    pub from: Pocket,
    pub to: Pocket,
    pub detail: String,
}

/// Read-mostly view of build and publication state for one tracker's
/// packages.
pub trait DebsProvider: Send + Sync {
    /// The package set is routed through this pocket.
    fn has_route(&self, pocket: Pocket) -> bool;

    /// `component` ("main", "meta", "signed", ...) is a real package of
    /// this source.
    fn valid_package(&self, component: &str) -> bool;

    fn uploaded(&self, component: &str) -> bool;

    fn release_tag_published(&self, component: &str) -> bool;

    fn uploader(&self, component: &str) -> Option<String>;

    fn ready_to_prepare(&self) -> bool;

    fn all_built_in_pocket(&self, pocket: Pocket) -> bool;

    fn all_built_and_in_pocket_or_after(&self, pocket: Pocket) -> bool {
        self.all_built_in_pocket(pocket)
            || pocket.after().iter().any(|after| self.all_built_in_pocket(*after))
    }

    /// Packages have reached -proposed (or moved on from it).
    fn ready_for_testing(&self) -> bool {
        self.all_built_and_in_pocket_or_after(Pocket::Proposed)
    }

    /// Packages present in `source` that `destination` does not yet carry.
    fn delta(&self, source: Pocket, destination: Pocket) -> Vec<String>;

    fn build_failures(&self, pocket: Pocket) -> Vec<BuildFailure>;

    fn publish_state(&self, pocket: Pocket) -> PublishState;

    /// Every published package landed in its expected archive component.
    fn components_correct(&self, pocket: Pocket) -> bool;

    fn package_present(&self, package: &str, pocket: Pocket) -> bool;

    /// An older tracker for the same source still active in `pocket`.
    fn older_tracker_in_pocket(&self, pocket: Pocket) -> Option<BugId>;

    /// Identifier of the current preparation (changes on re-spin).
    fn prepare_id(&self) -> Option<String>;

    fn request_copy(&self, from: Pocket, to: Pocket) -> Result<(), CopyError>;
}

// ============================================================================
// Static state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ComponentState {
    pub valid: bool,
    pub uploaded: bool,
    pub tag_published: bool,
    pub uploader: Option<String>,
}

impl Default for ComponentState {
    fn default() -> Self {
        Self {
            valid: true,
            uploaded: false,
            tag_published: false,
            uploader: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PocketState {
    pub built: bool,
    pub publish: PublishState,
    pub components_correct: bool,
    pub packages: BTreeSet<String>,
    pub failures: Vec<BuildFailure>,
    pub older_tracker: Option<BugId>,
}

impl Default for PocketState {
    fn default() -> Self {
        Self {
            built: false,
            publish: PublishState::Absent,
            components_correct: true,
            packages: BTreeSet::new(),
            failures: Vec::new(),
            older_tracker: None,
        }
    }
}

/// Point-in-time answers for every [`DebsProvider`] query, as captured by
/// the snapshot adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DebsState {
    pub routes: BTreeSet<Pocket>,
    pub components: BTreeMap<String, ComponentState>,
    pub ready_to_prepare: bool,
    pub pockets: BTreeMap<Pocket, PocketState>,
    pub prepare_id: Option<String>,
    /// When set, copy requests fail with this detail.
    pub copy_failure: Option<String>,
}

impl DebsState {
    fn pocket(&self, pocket: Pocket) -> Option<&PocketState> {
        self.pockets.get(&pocket)
    }

    fn component(&self, component: &str) -> Option<&ComponentState> {
        self.components.get(component)
    }
}

impl DebsProvider for DebsState {
    fn has_route(&self, pocket: Pocket) -> bool {
        self.routes.contains(&pocket)
    }

    fn valid_package(&self, component: &str) -> bool {
        self.component(component).is_some_and(|c| c.valid)
    }

    fn uploaded(&self, component: &str) -> bool {
        self.component(component).is_some_and(|c| c.uploaded)
    }

    fn release_tag_published(&self, component: &str) -> bool {
        self.component(component).is_some_and(|c| c.tag_published)
    }

    fn uploader(&self, component: &str) -> Option<String> {
        self.component(component).and_then(|c| c.uploader.clone())
    }

    fn ready_to_prepare(&self) -> bool {
        self.ready_to_prepare
    }

    fn all_built_in_pocket(&self, pocket: Pocket) -> bool {
        self.pocket(pocket).is_some_and(|p| p.built)
    }

    fn delta(&self, source: Pocket, destination: Pocket) -> Vec<String> {
        let Some(src) = self.pocket(source) else {
            return Vec::new();
        };
        let dst = self.pocket(destination);
        src.packages
            .iter()
            .filter(|package| !dst.is_some_and(|d| d.packages.contains(*package)))
            .cloned()
            .collect()
    }

    fn build_failures(&self, pocket: Pocket) -> Vec<BuildFailure> {
        self.pocket(pocket)
            .map(|p| p.failures.clone())
            .unwrap_or_default()
    }

    fn publish_state(&self, pocket: Pocket) -> PublishState {
        self.pocket(pocket)
            .map(|p| p.publish)
            .unwrap_or_default()
    }

    fn components_correct(&self, pocket: Pocket) -> bool {
        self.pocket(pocket).is_none_or(|p| p.components_correct)
    }

    fn package_present(&self, package: &str, pocket: Pocket) -> bool {
        self.pocket(pocket)
            .is_some_and(|p| p.packages.contains(package))
    }

    fn older_tracker_in_pocket(&self, pocket: Pocket) -> Option<BugId> {
        self.pocket(pocket).and_then(|p| p.older_tracker)
    }

    fn prepare_id(&self) -> Option<String> {
        self.prepare_id.clone()
    }

    fn request_copy(&self, from: Pocket, to: Pocket) -> Result<(), CopyError> {
        match &self.copy_failure {
            Some(detail) => Err(CopyError {
                from,
                to,
                detail: detail.clone(),
            }),
            None => Ok(()),
        }
    }
}
