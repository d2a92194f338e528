//! Workflow engine implementation.
//!
//! A crank evaluates every task of one bug against current truth, repeating
//! while anything moved so that dependent tasks converge in a single run.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::bug::{Bug, Reason, TaskStatus};
use crate::config::EngineConfig;
use crate::handlers::{handler_for, TaskContext, TaskError, Transition};

use super::types::{CrankOutcome, EngineError, TaskFailure, TransitionRecord};

/// Drives tracking bugs through their task state machines.
pub struct WorkflowEngine {
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reconcile every task on `bug` as of `now`.
    ///
    /// Handler errors are absorbed per task. The only error returned is a
    /// strict-dispatch failure, in which case `bug` is left exactly as it
    /// was passed in.
    pub fn crank(&self, bug: &mut Bug, now: DateTime<Utc>) -> Result<CrankOutcome, EngineError> {
        let original = bug.clone();
        let mut outcome = CrankOutcome {
            bug: bug.id,
            ..CrankOutcome::default()
        };

        debug!("Cranking bug {} ({} tasks)", bug.id, bug.tasks.len());

        while outcome.passes < self.config.engine.max_passes {
            outcome.passes += 1;
            let pass = outcome.passes;

            for task in bug.tasks.values_mut() {
                task.reason = None;
            }

            let mut changed = false;
            let names: Vec<String> = bug.tasks.keys().cloned().collect();
            for name in names {
                match self.evaluate_task(bug, &name, now, pass, &mut outcome) {
                    Ok(moved) => changed |= moved,
                    Err(e) => {
                        error!("Skipping bug {}: {}", original.id, e);
                        *bug = original;
                        return Err(e);
                    }
                }
            }

            if !changed {
                break;
            }
            debug!("Bug {} changed in pass {}, recranking", bug.id, pass);
        }

        if outcome.passes >= self.config.engine.max_passes && outcome.changed() {
            warn!(
                "Bug {} still changing after {} passes",
                bug.id, outcome.passes
            );
        }

        self.default_reasons(bug);

        if outcome.changed() {
            info!(
                "Bug {}: {} transitions in {} passes",
                bug.id,
                outcome.transitions.len(),
                outcome.passes
            );
        }
        Ok(outcome)
    }

    /// Evaluate one task. Returns whether its status moved.
    fn evaluate_task(
        &self,
        bug: &mut Bug,
        name: &str,
        now: DateTime<Utc>,
        pass: u32,
        outcome: &mut CrankOutcome,
    ) -> Result<bool, EngineError> {
        let Some(status) = bug.task_status(name) else {
            return Ok(false);
        };

        let Some(handler) = handler_for(name) else {
            debug!("Bug {} has unknown task {}", bug.id, name);
            if let Some(task) = bug.task_mut(name) {
                task.reason = Some(Reason::stalled("unknown workflow task"));
            }
            return Ok(false);
        };

        let saved_task = bug.task(name).cloned();
        let saved_tags = bug.tags.clone();
        let saved_properties = bug.properties.clone();
        let saved_events = bug.events.len();

        let result = {
            let mut ctx = TaskContext::new(bug, name, now, &self.config);
            handler.evaluate(status, &mut ctx)
        };

        match result {
            Ok(Transition::Changed) => {}
            Ok(Transition::Unchanged) => return Ok(false),
            Ok(Transition::Unmapped) => {
                if self.config.engine.strict_dispatch && !status.is_terminal() {
                    return Err(EngineError::UnmappedStatus {
                        bug: bug.id,
                        task: name.to_string(),
                        status,
                    });
                }
                debug!(
                    "Bug {} task {} ({}): nothing to do",
                    bug.id, name, status
                );
                return Ok(false);
            }
            Err(e) if e.is_retryable() => {
                warn!("Bug {} task {}: {}, will retry", bug.id, name, e);
                if let (Some(saved), Some(task)) = (saved_task, bug.task_mut(name)) {
                    *task = saved;
                }
                bug.tags = saved_tags;
                bug.properties = saved_properties;
                bug.events.truncate(saved_events);

                let retry = now + Duration::minutes(i64::from(self.config.test_results.retry_minutes));
                bug.refresh_at(retry, &format!("{} retry", name));
                if let Some(task) = bug.task_mut(name) {
                    task.reason = Some(Reason::holding(format!(
                        "{}, retrying at {}",
                        e,
                        retry.format("%Y-%m-%d %H:%M")
                    )));
                }
                outcome.failures.push(failure(name, &e));
                return Ok(false);
            }
            Err(e) if e.is_config_inconsistency() => {
                error!("Bug {} task {}: {}", bug.id, name, e);
                outcome.failures.push(failure(name, &e));
                if let Some(task) = bug.task_mut(name) {
                    task.set_status(TaskStatus::Incomplete, now);
                    task.reason = Some(Reason::stalled(e.to_string()));
                }
            }
            Err(e) => {
                warn!("Bug {} task {}: {}", bug.id, name, e);
                outcome.failures.push(failure(name, &e));
                if let Some(task) = bug.task_mut(name) {
                    task.reason = Some(Reason::stalled(e.to_string()));
                }
            }
        }

        let to = bug.task_status(name).unwrap_or(status);
        if to == status {
            return Ok(false);
        }
        outcome.transitions.push(TransitionRecord {
            task: name.to_string(),
            from: status,
            to,
            pass,
        });
        Ok(true)
    }

    /// Explain active tasks whose handler left no reason.
    fn default_reasons(&self, bug: &mut Bug) {
        for task in bug.tasks.values_mut() {
            if task.reason.is_some() {
                continue;
            }
            task.reason = match task.status {
                TaskStatus::Confirmed => Some(Reason::pending("Ready")),
                TaskStatus::InProgress | TaskStatus::FixCommitted => {
                    Some(Reason::ongoing(format!("status {}", task.status)))
                }
                TaskStatus::Incomplete => Some(Reason::stalled("FAILED")),
                _ => None,
            };
        }
    }
}

fn failure(task: &str, err: &TaskError) -> TaskFailure {
    TaskFailure {
        task: task.to_string(),
        message: err.to_string(),
        retryable: err.is_retryable(),
    }
}
