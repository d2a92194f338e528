//! Mock snap-store provider for testing.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bug::BugId;
use crate::providers::{SnapProvider, SnapRisk, SnapState};

/// Mock implementation of [`SnapProvider`]. Starts eligible for every risk
/// with nothing prepared or released.
#[derive(Debug, Clone, Default)]
pub struct MockSnap {
    state: Arc<RwLock<SnapState>>,
}

impl MockSnap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SnapState {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, SnapState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SnapState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_prepared(&self, prepared: bool) {
        self.write().prepared = prepared;
    }

    pub fn set_eligible(&self, risk: SnapRisk, eligible: bool) {
        let mut state = self.write();
        if eligible {
            state.eligible.insert(risk);
        } else {
            state.eligible.remove(&risk);
        }
    }

    pub fn set_in_channel(&self, risk: SnapRisk, present: bool) {
        let mut state = self.write();
        if present {
            state.channels.insert(risk);
        } else {
            state.channels.remove(&risk);
        }
    }

    pub fn set_older_tracker(&self, risk: SnapRisk, tracker: Option<BugId>) {
        let mut state = self.write();
        match tracker {
            Some(id) => state.older_trackers.insert(risk, id),
            None => state.older_trackers.remove(&risk),
        };
    }

    pub fn set_published(&self, published: bool) {
        self.write().published = published;
    }

    pub fn set_inconsistencies(&self, inconsistencies: Vec<String>) {
        self.write().inconsistencies = inconsistencies;
    }
}

impl SnapProvider for MockSnap {
    fn prepared(&self) -> bool {
        self.read().prepared()
    }

    fn promote_eligible(&self, risk: SnapRisk) -> bool {
        self.read().promote_eligible(risk)
    }

    fn in_channel(&self, risk: SnapRisk) -> bool {
        self.read().in_channel(risk)
    }

    fn older_tracker(&self, risk: SnapRisk) -> Option<BugId> {
        self.read().older_tracker(risk)
    }

    fn published(&self) -> bool {
        self.read().published()
    }

    fn channel_inconsistencies(&self) -> Vec<String> {
        self.read().channel_inconsistencies()
    }
}
