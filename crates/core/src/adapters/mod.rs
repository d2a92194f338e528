//! Conversion between the engine's typed model and the formats the
//! surrounding tooling stores bugs in.

pub mod description;
pub mod snapshot;

pub use description::{
    parse_properties, render_description, split_description, DescriptionError, PROPERTIES_MARKER,
};
pub use snapshot::{
    load_snapshot, save_snapshot, BugRecord, MasterSnapshot, SnapshotError, WorldSnapshot,
};
