//! Snap-store status provider.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bug::BugId;

/// Snap-store risk channel, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapRisk {
    Edge,
    Beta,
    Candidate,
    Stable,
}

impl SnapRisk {
    pub const ALL: [SnapRisk; 4] = [
        SnapRisk::Edge,
        SnapRisk::Beta,
        SnapRisk::Candidate,
        SnapRisk::Stable,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SnapRisk::Edge => "edge",
            SnapRisk::Beta => "beta",
            SnapRisk::Candidate => "candidate",
            SnapRisk::Stable => "stable",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            SnapRisk::Edge => "Edge",
            SnapRisk::Beta => "Beta",
            SnapRisk::Candidate => "Candidate",
            SnapRisk::Stable => "Stable",
        }
    }

    pub fn task_name(&self) -> String {
        format!("snap-release-to-{}", self.as_str())
    }

    pub fn block_tag(&self) -> String {
        format!("kernel-block-snap-{}", self.as_str())
    }
}

impl fmt::Display for SnapRisk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait SnapProvider: Send + Sync {
    /// The snap has been built and uploaded to the store.
    fn prepared(&self) -> bool;

    /// This snap is configured to be released to `risk`.
    fn promote_eligible(&self, risk: SnapRisk) -> bool;

    /// The current revision is visible in `risk`.
    fn in_channel(&self, risk: SnapRisk) -> bool;

    /// An older tracker is still releasing to the same channel.
    fn older_tracker(&self, risk: SnapRisk) -> Option<BugId>;

    /// Store metadata published for every track.
    fn published(&self) -> bool;

    /// Descriptions of channel revision mismatches; empty when consistent.
    fn channel_inconsistencies(&self) -> Vec<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SnapState {
    pub prepared: bool,
    pub eligible: BTreeSet<SnapRisk>,
    pub channels: BTreeSet<SnapRisk>,
    pub older_trackers: BTreeMap<SnapRisk, BugId>,
    pub published: bool,
    pub inconsistencies: Vec<String>,
}

impl Default for SnapState {
    fn default() -> Self {
        Self {
            prepared: false,
            eligible: SnapRisk::ALL.into_iter().collect(),
            channels: BTreeSet::new(),
            older_trackers: BTreeMap::new(),
            published: false,
            inconsistencies: Vec::new(),
        }
    }
}

impl SnapProvider for SnapState {
    fn prepared(&self) -> bool {
        self.prepared
    }

    fn promote_eligible(&self, risk: SnapRisk) -> bool {
        self.eligible.contains(&risk)
    }

    fn in_channel(&self, risk: SnapRisk) -> bool {
        self.channels.contains(&risk)
    }

    fn older_tracker(&self, risk: SnapRisk) -> Option<BugId> {
        self.older_trackers.get(&risk).copied()
    }

    fn published(&self) -> bool {
        self.published
    }

    fn channel_inconsistencies(&self) -> Vec<String> {
        self.inconsistencies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_eligible_everywhere() {
        let state = SnapState::default();
        for risk in SnapRisk::ALL {
            assert!(state.promote_eligible(risk));
            assert!(!state.in_channel(risk));
        }
    }

    #[test]
    fn test_risk_names() {
        assert_eq!(SnapRisk::Candidate.task_name(), "snap-release-to-candidate");
        assert_eq!(SnapRisk::Stable.block_tag(), "kernel-block-snap-stable");
    }
}
