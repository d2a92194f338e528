//! Snapshot round trips: load, materialise, crank, write back, reload.

use swm_core::{
    load_config_from_str, load_snapshot, save_snapshot, testing::fixtures, TaskStatus,
    WorkflowEngine, WorldSnapshot,
};

const SNAPSHOT: &str = r#"{
  "bugs": [
    {
      "id": 900,
      "series": "noble",
      "source": "linux",
      "cycle": "2024.03.04",
      "description": "linux master tracker",
      "tasks": [
        { "name": "kernel-sru-workflow", "status": "In Progress" },
        { "name": "promote-to-proposed", "status": "Fix Released" },
        { "name": "promote-to-updates", "status": "New" }
      ],
      "debs": {
        "routes": ["proposed", "updates"],
        "pockets": { "proposed": { "built": true, "publish": "published" } }
      }
    },
    {
      "id": 1001,
      "series": "noble",
      "source": "linux-oem",
      "cycle": "2024.03.04",
      "master": 900,
      "tasks": [
        { "name": "kernel-sru-workflow", "status": "In Progress" },
        { "name": "promote-to-proposed", "status": "Fix Released" },
        { "name": "promote-to-updates", "status": "New" }
      ],
      "debs": {
        "routes": ["proposed", "updates"],
        "pockets": { "proposed": { "built": true, "publish": "published" } }
      }
    }
  ]
}"#;

fn run_once(path: &std::path::Path) -> WorldSnapshot {
    let config = load_config_from_str("[policy]\nready_cycles = [\"2024.03.04\"]").unwrap();
    let mut snapshot = load_snapshot(path).unwrap();
    let mut bugs = snapshot.materialise(&config).unwrap();

    let engine = WorkflowEngine::new(config);
    for bug in bugs.iter_mut() {
        engine.crank(bug, fixtures::now()).unwrap();
    }
    snapshot.write_back(&mut bugs).unwrap();
    save_snapshot(path, &snapshot).unwrap();
    snapshot
}

fn status(snapshot: &WorldSnapshot, bug: u64, task: &str) -> Option<TaskStatus> {
    snapshot
        .bugs
        .iter()
        .find(|record| record.id == bug)?
        .tasks
        .iter()
        .find(|t| t.name == task)
        .map(|t| t.status)
}

#[test]
fn test_derivative_catches_up_on_next_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, SNAPSHOT).unwrap();

    // The derivative sees the master as it was when the snapshot was taken.
    let first = run_once(&path);
    assert_eq!(status(&first, 900, "promote-to-updates"), Some(TaskStatus::Confirmed));
    assert_eq!(status(&first, 1001, "promote-to-updates"), Some(TaskStatus::New));
    let held = first.bugs[1]
        .tasks
        .iter()
        .find(|t| t.name == "promote-to-updates")
        .and_then(|t| t.reason.clone())
        .map(|r| r.to_string())
        .unwrap_or_default();
    assert_eq!(held, "Holding -- master bug 900 promote-to-updates is New");

    let second = run_once(&path);
    assert_eq!(status(&second, 900, "promote-to-updates"), Some(TaskStatus::Confirmed));
    assert_eq!(status(&second, 1001, "promote-to-updates"), Some(TaskStatus::Confirmed));
}

#[test]
fn test_written_description_keeps_human_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, SNAPSHOT).unwrap();

    run_once(&path);
    let reloaded = load_snapshot(&path).unwrap();
    let master = &reloaded.bugs[0];
    assert!(master.description.starts_with("linux master tracker"));
    assert!(master.description.contains("-- swm properties --"));
}
