use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use swm_core::{
    load_config, load_snapshot, save_snapshot, validate_config, CrankOutcome, EngineConfig,
    WorkflowEngine,
};

/// Default configuration file, used when `SWM_CONFIG` is not set.
const DEFAULT_CONFIG: &str = "swm.toml";

#[derive(Parser)]
#[command(name = "swm")]
#[command(version, about = "Reconcile kernel SRU tracking bugs against the archive")]
struct Cli {
    /// JSON snapshot of the tracking bugs to crank
    snapshot: PathBuf,

    /// Crank and report, but do not write the snapshot back
    #[arg(long)]
    dry_run: bool,

    /// Evaluate as of this instant (RFC 3339) instead of the current time
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Only crank these bugs
    #[arg(long = "bug")]
    bugs: Vec<u64>,
}

fn main() {
    if let Err(e) = run() {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = config()?;
    validate_config(&config).context("Configuration validation failed")?;

    let now = cli.now.unwrap_or_else(Utc::now);
    info!("Loading snapshot from {:?}", cli.snapshot);
    let mut snapshot = load_snapshot(&cli.snapshot)
        .with_context(|| format!("Failed to load snapshot from {:?}", cli.snapshot))?;
    let mut bugs = snapshot
        .materialise(&config)
        .context("Failed to materialise tracking bugs")?;
    if !cli.bugs.is_empty() {
        bugs.retain(|bug| cli.bugs.contains(&bug.id));
    }
    info!("Cranking {} bugs as of {}", bugs.len(), now);

    let engine = WorkflowEngine::new(config);
    let mut outcomes: Vec<CrankOutcome> = Vec::with_capacity(bugs.len());
    let mut skipped = 0usize;
    for bug in bugs.iter_mut() {
        match engine.crank(bug, now) {
            Ok(outcome) => {
                for transition in &outcome.transitions {
                    info!(
                        "Bug {} {}: {} -> {} (pass {})",
                        outcome.bug, transition.task, transition.from, transition.to, transition.pass
                    );
                }
                for failure in &outcome.failures {
                    warn!("Bug {} {}: {}", outcome.bug, failure.task, failure.message);
                }
                outcomes.push(outcome);
            }
            Err(e) => {
                error!("Bug {} skipped: {}", bug.id, e);
                skipped += 1;
            }
        }
    }

    let changed = outcomes.iter().filter(|outcome| outcome.changed()).count();
    info!(
        "{} bugs changed, {} unchanged, {} skipped",
        changed,
        outcomes.len() - changed,
        skipped
    );

    if cli.dry_run {
        info!("Dry run, snapshot not written");
    } else {
        snapshot
            .write_back(&mut bugs)
            .context("Failed to write reconciled state back")?;
        save_snapshot(&cli.snapshot, &snapshot)
            .with_context(|| format!("Failed to save snapshot to {:?}", cli.snapshot))?;
        info!("Snapshot written to {:?}", cli.snapshot);
    }

    let report = serde_json::to_string_pretty(&outcomes).context("Failed to render report")?;
    println!("{}", report);
    Ok(())
}

/// Load the engine configuration. A missing default file means defaults;
/// a missing file named by `SWM_CONFIG` is an error.
fn config() -> Result<EngineConfig> {
    match std::env::var("SWM_CONFIG") {
        Ok(path) => load_from(Path::new(&path)),
        Err(_) if Path::new(DEFAULT_CONFIG).exists() => load_from(Path::new(DEFAULT_CONFIG)),
        Err(_) => {
            info!("No {} found, using default configuration", DEFAULT_CONFIG);
            Ok(EngineConfig::default())
        }
    }
}

fn load_from(path: &Path) -> Result<EngineConfig> {
    info!("Loading configuration from {:?}", path);
    load_config(path).with_context(|| format!("Failed to load config from {:?}", path))
}
