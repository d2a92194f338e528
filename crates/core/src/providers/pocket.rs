use std::fmt;

use serde::{Deserialize, Serialize};

/// An archive publication pocket, in routing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pocket {
    Ppa,
    Signing,
    Proposed,
    AsProposed,
    Updates,
    Security,
    Release,
}

impl Pocket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pocket::Ppa => "ppa",
            Pocket::Signing => "signing",
            Pocket::Proposed => "proposed",
            Pocket::AsProposed => "as-proposed",
            Pocket::Updates => "updates",
            Pocket::Security => "security",
            Pocket::Release => "release",
        }
    }

    /// Capitalised form used in phase labels ("Promoted to Updates").
    pub fn title(&self) -> &'static str {
        match self {
            Pocket::Ppa => "PPA",
            Pocket::Signing => "Signing",
            Pocket::Proposed => "Proposed",
            Pocket::AsProposed => "As-Proposed",
            Pocket::Updates => "Updates",
            Pocket::Security => "Security",
            Pocket::Release => "Release",
        }
    }

    /// Pockets users install from.
    pub fn is_production(&self) -> bool {
        matches!(self, Pocket::Updates | Pocket::Security | Pocket::Release)
    }

    /// Pockets a package can legitimately move on to after this one.
    pub fn after(&self) -> &'static [Pocket] {
        match self {
            Pocket::Ppa => &[
                Pocket::Signing,
                Pocket::Proposed,
                Pocket::Updates,
                Pocket::Security,
                Pocket::Release,
            ],
            Pocket::Signing => &[
                Pocket::Proposed,
                Pocket::Updates,
                Pocket::Security,
                Pocket::Release,
            ],
            Pocket::Proposed => &[Pocket::Updates, Pocket::Security, Pocket::Release],
            Pocket::Updates => &[Pocket::Security],
            Pocket::AsProposed | Pocket::Security | Pocket::Release => &[],
        }
    }

    /// Manual block tag specific to promotions into this pocket.
    pub fn block_tag(&self) -> String {
        format!("kernel-block-{}", self.as_str())
    }
}

impl fmt::Display for Pocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
