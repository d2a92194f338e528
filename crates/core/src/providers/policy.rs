//! Release policy: blackout/freeze windows, cycle readiness and companion
//! packages.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc, Weekday};

use crate::config::{ConfigError, PolicyConfig, TimeWindow};

/// Timestamp format used in policy windows (always UTC).
pub const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M";

pub trait PolicyProvider: Send + Sync {
    /// Automatic promotion to production pockets is suppressed.
    fn in_blackout(&self, now: DateTime<Utc>) -> bool;

    /// Development-series promotions are suppressed.
    fn in_freeze(&self, now: DateTime<Utc>) -> bool;

    fn cycle_ready(&self, cycle: &str) -> bool;

    /// Packages that must be present before `source` may be promoted.
    fn required_companions(&self, source: &str) -> Vec<String>;
}

/// A half-open `[start, end)` time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now < self.end
    }
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    NaiveDateTime::parse_from_str(value.trim(), WINDOW_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            ConfigError::ValidationError(format!("invalid window time '{}': {}", value, e))
        })
}

/// Parse and check a configured window.
pub fn parse_window(window: &TimeWindow) -> Result<Window, ConfigError> {
    let start = parse_instant(&window.0)?;
    let end = parse_instant(&window.1)?;
    if start >= end {
        return Err(ConfigError::ValidationError(format!(
            "window start {} is not before end {}",
            window.0, window.1
        )));
    }
    Ok(Window { start, end })
}

/// Legacy weekend hold: Friday 18:00 UTC until Sunday 21:00 UTC.
pub fn in_weekend_hold(now: DateTime<Utc>) -> bool {
    match now.weekday() {
        Weekday::Fri => now.hour() >= 18,
        Weekday::Sat => true,
        Weekday::Sun => now.hour() < 21,
        _ => false,
    }
}

/// Policy loaded from the `[policy]` configuration section.
#[derive(Debug, Clone, Default)]
pub struct SwmConfig {
    pub deployment_blackout: Vec<Window>,
    pub development_freeze: Vec<Window>,
    pub ready_cycles: BTreeSet<String>,
    pub companion_packages: BTreeMap<String, Vec<String>>,
}

impl SwmConfig {
    pub fn from_config(config: &PolicyConfig) -> Result<Self, ConfigError> {
        let deployment_blackout = config
            .deployment_blackout
            .iter()
            .map(parse_window)
            .collect::<Result<Vec<_>, _>>()?;
        let development_freeze = config
            .development_freeze
            .iter()
            .map(parse_window)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            deployment_blackout,
            development_freeze,
            ready_cycles: config.ready_cycles.iter().cloned().collect(),
            companion_packages: config.companion_packages.clone(),
        })
    }
}

impl PolicyProvider for SwmConfig {
    fn in_blackout(&self, now: DateTime<Utc>) -> bool {
        self.deployment_blackout.iter().any(|w| w.contains(now))
    }

    fn in_freeze(&self, now: DateTime<Utc>) -> bool {
        self.development_freeze.iter().any(|w| w.contains(now))
    }

    fn cycle_ready(&self, cycle: &str) -> bool {
        self.ready_cycles.contains(cycle)
    }

    fn required_companions(&self, source: &str) -> Vec<String> {
        self.companion_packages
            .get(source)
            .cloned()
            .unwrap_or_default()
    }
}
