//! Capabilities the engine consumes from its collaborators.
//!
//! Each provider is a read-only trait; the `*State` structs are static
//! implementations filled in by the snapshot adapter.

mod debs;
mod feed;
mod master;
mod pocket;
mod policy;
mod snap;

pub use debs::{
    failures_to_text, BuildFailure, BuildState, ComponentState, CopyError, DebsProvider,
    DebsState, PocketState, PublishState,
};
pub use feed::{feed_status, FeedError, StaticResults, TestQuery, TestResultsProvider};
pub use master::MasterBugView;
pub use pocket::Pocket;
pub use policy::{in_weekend_hold, parse_window, PolicyProvider, SwmConfig, Window, WINDOW_FORMAT};
pub use snap::{SnapProvider, SnapRisk, SnapState};
