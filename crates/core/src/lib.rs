pub mod adapters;
pub mod bug;
pub mod config;
pub mod engine;
pub mod handlers;
pub mod providers;
pub mod testing;

pub use adapters::{load_snapshot, save_snapshot, BugRecord, SnapshotError, WorldSnapshot};
pub use bug::{Bug, BugEvent, BugId, MonitorRecord, Reason, ReasonState, Task, TaskStatus, Variant};
pub use config::{load_config, load_config_from_str, validate_config, ConfigError, EngineConfig};
pub use engine::{CrankOutcome, EngineError, TaskFailure, TransitionRecord, WorkflowEngine};
pub use handlers::{handler_for, TaskContext, TaskError, TaskHandler, Transition};
pub use providers::{
    DebsProvider, MasterBugView, Pocket, PolicyProvider, SnapProvider, SnapRisk,
    TestResultsProvider,
};
