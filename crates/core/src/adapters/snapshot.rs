//! JSON snapshot of a batch of tracking bugs and everything their providers
//! would answer.
//!
//! The snapshot is what the external tooling hands the engine: it is
//! materialised into [`Bug`]s, cranked, and the reconciled task state and
//! outbox are written back into the same records.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::description::{parse_properties, render_description, DescriptionError};
use crate::bug::{Bug, BugEvent, BugId, Task, TaskStatus, Variant};
use crate::config::{ConfigError, EngineConfig, PolicyConfig};
use crate::providers::{
    DebsState, MasterBugView, PolicyProvider, SnapState, StaticResults, SwmConfig,
};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("bug {bug}: {source}")]
    Description {
        bug: BugId,
        #[source]
        source: DescriptionError,
    },

    #[error("policy error: {0}")]
    Policy(#[from] ConfigError),

    #[error("bug {0} names itself as its master")]
    InvalidMaster(BugId),

    #[error("bug {0} appears more than once")]
    DuplicateBug(BugId),
}

/// Everything the engine needs for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
    pub bugs: Vec<BugRecord>,
}

/// One tracking bug as stored in the snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BugRecord {
    pub id: BugId,
    pub series: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub development_series: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Free-text description, including the properties block.
    #[serde(default)]
    pub description: String,
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<BugId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debs: Option<DebsState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snap: Option<SnapState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<StaticResults>,
    /// Overrides the configured policy for this bug only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<PolicyConfig>,
    /// Side effects produced by previous runs, waiting for delivery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbox: Vec<BugEvent>,
}

/// Task statuses of a master bug as they were when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterSnapshot {
    pub id: BugId,
    pub tasks: BTreeMap<String, TaskStatus>,
}

impl MasterSnapshot {
    fn from_record(record: &BugRecord) -> Self {
        Self {
            id: record.id,
            tasks: record
                .tasks
                .iter()
                .map(|task| (task.name.clone(), task.status))
                .collect(),
        }
    }
}

impl MasterBugView for MasterSnapshot {
    fn id(&self) -> BugId {
        self.id
    }

    fn task_status(&self, name: &str) -> Option<TaskStatus> {
        self.tasks.get(name).copied()
    }
}

pub fn load_snapshot(path: &Path) -> Result<WorldSnapshot, SnapshotError> {
    let text = std::fs::read_to_string(path)?;
    let snapshot = serde_json::from_str(&text)?;
    Ok(snapshot)
}

pub fn save_snapshot(path: &Path, snapshot: &WorldSnapshot) -> Result<(), SnapshotError> {
    let text = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, text)?;
    Ok(())
}

impl WorldSnapshot {
    /// Build engine-side bugs for every record.
    pub fn materialise(&self, config: &EngineConfig) -> Result<Vec<Bug>, SnapshotError> {
        let default_policy: Arc<dyn PolicyProvider> =
            Arc::new(SwmConfig::from_config(&config.policy)?);

        let mut by_id: BTreeMap<BugId, &BugRecord> = BTreeMap::new();
        for record in &self.bugs {
            if by_id.insert(record.id, record).is_some() {
                return Err(SnapshotError::DuplicateBug(record.id));
            }
        }

        let mut bugs = Vec::with_capacity(self.bugs.len());
        for record in &self.bugs {
            let policy = match &record.policy {
                Some(policy) => Arc::new(SwmConfig::from_config(policy)?) as Arc<dyn PolicyProvider>,
                None => default_policy.clone(),
            };

            let mut bug = Bug::new(record.id, &record.series, &record.source, policy);
            bug.version = record.version.clone();
            bug.variant = record.variant;
            bug.development_series = record.development_series;
            bug.cycle = record.cycle.clone();
            bug.tags = record.tags.clone();
            bug.properties =
                parse_properties(&record.description).map_err(|source| SnapshotError::Description {
                    bug: record.id,
                    source,
                })?;
            bug.tasks = record
                .tasks
                .iter()
                .map(|task| (task.name.clone(), task.clone()))
                .collect();

            if let Some(debs) = &record.debs {
                bug = bug.with_debs(Arc::new(debs.clone()));
            }
            if let Some(snap) = &record.snap {
                bug = bug.with_snap(Arc::new(snap.clone()));
            }
            if let Some(results) = &record.test_results {
                bug = bug.with_test_results(Arc::new(results.clone()));
            }

            if let Some(master_id) = record.master {
                if master_id == record.id {
                    return Err(SnapshotError::InvalidMaster(record.id));
                }
                let view = by_id.get(&master_id).map(|master| {
                    Arc::new(MasterSnapshot::from_record(master)) as Arc<dyn MasterBugView>
                });
                if view.is_none() {
                    warn!(
                        "Bug {} master bug {} is not in the snapshot",
                        record.id, master_id
                    );
                }
                bug = bug.with_master(master_id, view);
            }

            debug!("Materialised bug {} ({} tasks)", bug.id, bug.tasks.len());
            bugs.push(bug);
        }
        Ok(bugs)
    }

    /// Copy reconciled state back into the matching records and move each
    /// bug's outbox into its record.
    pub fn write_back(&mut self, bugs: &mut [Bug]) -> Result<(), SnapshotError> {
        for bug in bugs.iter_mut() {
            let Some(record) = self.bugs.iter_mut().find(|record| record.id == bug.id) else {
                warn!("Bug {} has no record to write back to", bug.id);
                continue;
            };

            record.tags = bug.tags.clone();
            record.tasks = bug.tasks.values().cloned().collect();
            record.description =
                render_description(&record.description, &bug.properties).map_err(|source| {
                    SnapshotError::Description {
                        bug: bug.id,
                        source,
                    }
                })?;
            record.outbox.extend(bug.drain_events());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Pocket;
    use tempfile::tempdir;

    fn record(id: BugId, master: Option<BugId>) -> BugRecord {
        BugRecord {
            id,
            series: "noble".to_string(),
            source: "linux".to_string(),
            version: Some("6.8.0-50.51".to_string()),
            variant: Variant::Debs,
            development_series: false,
            cycle: Some("2024.03.04".to_string()),
            tags: BTreeSet::new(),
            description: String::new(),
            tasks: vec![
                Task::new("kernel-sru-workflow", TaskStatus::InProgress),
                Task::new("promote-to-updates", TaskStatus::New),
            ],
            master,
            debs: Some(DebsState {
                routes: [Pocket::Proposed, Pocket::Updates].into_iter().collect(),
                ..DebsState::default()
            }),
            snap: None,
            test_results: None,
            policy: None,
            outbox: Vec::new(),
        }
    }

    #[test]
    fn test_materialise_resolves_master() {
        let snapshot = WorldSnapshot {
            captured_at: None,
            bugs: vec![record(900, None), record(1001, Some(900))],
        };
        let bugs = snapshot.materialise(&EngineConfig::default()).unwrap();

        let derivative = &bugs[1];
        let master = derivative.master().unwrap();
        assert_eq!(master.id(), 900);
        assert_eq!(master.task_status("promote-to-updates"), Some(TaskStatus::New));
        assert!(derivative.debs.is_some());
    }

    #[test]
    fn test_dangling_master_has_no_view() {
        let snapshot = WorldSnapshot {
            captured_at: None,
            bugs: vec![record(1001, Some(900))],
        };
        let bugs = snapshot.materialise(&EngineConfig::default()).unwrap();
        assert!(bugs[0].is_derivative());
        assert!(bugs[0].master().is_none());
    }

    #[test]
    fn test_self_master_rejected() {
        let snapshot = WorldSnapshot {
            captured_at: None,
            bugs: vec![record(1001, Some(1001))],
        };
        let result = snapshot.materialise(&EngineConfig::default());
        assert!(matches!(result, Err(SnapshotError::InvalidMaster(1001))));
    }

    #[test]
    fn test_duplicate_bug_rejected() {
        let snapshot = WorldSnapshot {
            captured_at: None,
            bugs: vec![record(1001, None), record(1001, None)],
        };
        assert!(matches!(
            snapshot.materialise(&EngineConfig::default()),
            Err(SnapshotError::DuplicateBug(1001))
        ));
    }

    #[test]
    fn test_write_back_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let mut snapshot = WorldSnapshot {
            captured_at: None,
            bugs: vec![record(1001, None)],
        };
        save_snapshot(&path, &snapshot).unwrap();
        let mut snapshot = load_snapshot(&path).unwrap();

        let mut bugs = snapshot.materialise(&EngineConfig::default()).unwrap();
        bugs[0].add_tag("verification-needed-noble");
        bugs[0].properties.phase = Some("Promote to Updates".to_string());
        bugs[0].add_comment("Packages available", "body");
        snapshot.write_back(&mut bugs).unwrap();

        let record = &snapshot.bugs[0];
        assert!(record.tags.contains("verification-needed-noble"));
        assert!(record.description.contains("Promote to Updates"));
        assert_eq!(record.outbox.len(), 1);
        assert!(bugs[0].events.is_empty());
    }
}
