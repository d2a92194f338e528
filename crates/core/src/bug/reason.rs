//! Human-readable task reasons.
//!
//! Every reason carries a state prefix so dashboards can colour it:
//! `Holding` (expected future condition), `Pending` (ready, waiting on a
//! human), `Ongoing` (work in flight) and `Stalled` (blocked, needs a human).

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReasonState {
    Holding,
    Pending,
    Ongoing,
    Stalled,
}

impl ReasonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonState::Holding => "Holding",
            ReasonState::Pending => "Pending",
            ReasonState::Ongoing => "Ongoing",
            ReasonState::Stalled => "Stalled",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "Holding" => Some(ReasonState::Holding),
            "Pending" => Some(ReasonState::Pending),
            "Ongoing" => Some(ReasonState::Ongoing),
            "Stalled" => Some(ReasonState::Stalled),
            _ => None,
        }
    }
}

impl fmt::Display for ReasonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task reason, rendered as `"<State> -- <text>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Reason {
    pub state: ReasonState,
    pub text: String,
}

impl Reason {
    pub fn new(state: ReasonState, text: impl Into<String>) -> Self {
        Self {
            state,
            text: text.into(),
        }
    }

    pub fn holding(text: impl Into<String>) -> Self {
        Self::new(ReasonState::Holding, text)
    }

    pub fn pending(text: impl Into<String>) -> Self {
        Self::new(ReasonState::Pending, text)
    }

    pub fn ongoing(text: impl Into<String>) -> Self {
        Self::new(ReasonState::Ongoing, text)
    }

    pub fn stalled(text: impl Into<String>) -> Self {
        Self::new(ReasonState::Stalled, text)
    }

    /// Parse a rendered reason. Text without a recognised prefix is kept
    /// whole and treated as `Stalled`, so a hand-written reason is never lost.
    pub fn parse(rendered: &str) -> Self {
        if let Some((state, text)) = rendered.split_once(" -- ") {
            if let Some(state) = ReasonState::parse(state.trim()) {
                return Self::new(state, text.trim());
            }
        }
        Self::stalled(rendered.trim())
    }

    pub fn render(&self) -> String {
        format!("{} -- {}", self.state, self.text)
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {}", self.state, self.text)
    }
}

impl From<String> for Reason {
    fn from(value: String) -> Self {
        Reason::parse(&value)
    }
}

impl From<Reason> for String {
    fn from(value: Reason) -> Self {
        value.render()
    }
}
