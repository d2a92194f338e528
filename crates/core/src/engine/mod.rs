//! Reconciliation engine.
//!
//! The engine owns no state between cranks: every crank re-derives each
//! task's status from the bug and its providers, so an external scheduler
//! can call it as often as it likes.

mod runner;
mod types;

pub use runner::WorkflowEngine;
pub use types::{CrankOutcome, EngineError, TaskFailure, TransitionRecord};
