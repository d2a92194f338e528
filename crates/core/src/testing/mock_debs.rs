//! Mock archive provider for testing.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::bug::BugId;
use crate::providers::{
    BuildFailure, ComponentState, CopyError, DebsProvider, DebsState, Pocket, PocketState,
    PublishState,
};

/// A copy request seen by the mock, for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCopy {
    pub source: Pocket,
    pub destination: Pocket,
    pub success: bool,
}

/// Mock implementation of [`DebsProvider`].
///
/// Clones share state, so a test can hand one clone to a bug and keep
/// adjusting the archive through the other:
///
/// ```rust,ignore
/// let debs = fixtures::debs_for_packaging();
/// let bug = fixtures::sru_bug(1001).with_debs(Arc::new(debs.clone()));
/// debs.set_built(Pocket::Ppa, true);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDebs {
    state: Arc<RwLock<DebsState>>,
    copies: Arc<RwLock<Vec<RecordedCopy>>>,
}

impl MockDebs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: DebsState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
            copies: Arc::default(),
        }
    }

    /// Copy of the current state, e.g. for writing a snapshot.
    pub fn snapshot(&self) -> DebsState {
        self.read().clone()
    }

    pub fn recorded_copies(&self) -> Vec<RecordedCopy> {
        self.copies
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, DebsState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DebsState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_pocket(&self, pocket: Pocket, f: impl FnOnce(&mut PocketState)) {
        let mut state = self.write();
        f(state.pockets.entry(pocket).or_default());
    }

    fn with_component(&self, component: &str, f: impl FnOnce(&mut ComponentState)) {
        let mut state = self.write();
        f(state.components.entry(component.to_string()).or_default());
    }

    // =========================================================================
    // Setters
    // =========================================================================

    pub fn add_route(&self, pocket: Pocket) {
        self.write().routes.insert(pocket);
    }

    pub fn remove_route(&self, pocket: Pocket) {
        self.write().routes.remove(&pocket);
    }

    pub fn set_ready_to_prepare(&self, ready: bool) {
        self.write().ready_to_prepare = ready;
    }

    pub fn set_prepare_id(&self, id: Option<&str>) {
        self.write().prepare_id = id.map(str::to_string);
    }

    pub fn set_copy_failure(&self, detail: Option<&str>) {
        self.write().copy_failure = detail.map(str::to_string);
    }

    pub fn set_component_uploaded(&self, component: &str, uploaded: bool, uploader: Option<&str>) {
        self.with_component(component, |c| {
            c.uploaded = uploaded;
            c.uploader = uploader.map(str::to_string);
        });
    }

    pub fn set_component_tag_published(&self, component: &str, published: bool) {
        self.with_component(component, |c| c.tag_published = published);
    }

    pub fn set_built(&self, pocket: Pocket, built: bool) {
        self.with_pocket(pocket, |p| p.built = built);
    }

    pub fn set_publish_state(&self, pocket: Pocket, publish: PublishState) {
        self.with_pocket(pocket, |p| p.publish = publish);
    }

    pub fn set_components_correct(&self, pocket: Pocket, correct: bool) {
        self.with_pocket(pocket, |p| p.components_correct = correct);
    }

    pub fn set_failures(&self, pocket: Pocket, failures: Vec<BuildFailure>) {
        self.with_pocket(pocket, |p| p.failures = failures);
    }

    pub fn set_packages(&self, pocket: Pocket, packages: &[&str]) {
        self.with_pocket(pocket, |p| {
            p.packages = packages.iter().map(|package| package.to_string()).collect();
        });
    }

    pub fn set_older_tracker(&self, pocket: Pocket, tracker: Option<BugId>) {
        self.with_pocket(pocket, |p| p.older_tracker = tracker);
    }
}

impl DebsProvider for MockDebs {
    fn has_route(&self, pocket: Pocket) -> bool {
        self.read().has_route(pocket)
    }

    fn valid_package(&self, component: &str) -> bool {
        self.read().valid_package(component)
    }

    fn uploaded(&self, component: &str) -> bool {
        self.read().uploaded(component)
    }

    fn release_tag_published(&self, component: &str) -> bool {
        self.read().release_tag_published(component)
    }

    fn uploader(&self, component: &str) -> Option<String> {
        self.read().uploader(component)
    }

    fn ready_to_prepare(&self) -> bool {
        self.read().ready_to_prepare()
    }

    fn all_built_in_pocket(&self, pocket: Pocket) -> bool {
        self.read().all_built_in_pocket(pocket)
    }

    fn delta(&self, source: Pocket, destination: Pocket) -> Vec<String> {
        self.read().delta(source, destination)
    }

    fn build_failures(&self, pocket: Pocket) -> Vec<BuildFailure> {
        self.read().build_failures(pocket)
    }

    fn publish_state(&self, pocket: Pocket) -> PublishState {
        self.read().publish_state(pocket)
    }

    fn components_correct(&self, pocket: Pocket) -> bool {
        self.read().components_correct(pocket)
    }

    fn package_present(&self, package: &str, pocket: Pocket) -> bool {
        self.read().package_present(package, pocket)
    }

    fn older_tracker_in_pocket(&self, pocket: Pocket) -> Option<BugId> {
        self.read().older_tracker_in_pocket(pocket)
    }

    fn prepare_id(&self) -> Option<String> {
        self.read().prepare_id()
    }

    fn request_copy(&self, from: Pocket, to: Pocket) -> Result<(), CopyError> {
        let result = self.read().request_copy(from, to);
        self.copies
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCopy {
                source: from,
                destination: to,
                success: result.is_ok(),
            });
        result
    }
}
