use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub promotion: PromotionConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub test_results: TestResultsConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// Crank loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSection {
    /// Maximum evaluation passes per bug in one crank.
    #[serde(default = "default_max_passes")]
    pub max_passes: u32,
    /// Treat a status with no handler mapping as an error and skip the bug.
    #[serde(default)]
    pub strict_dispatch: bool,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            max_passes: default_max_passes(),
            strict_dispatch: false,
        }
    }
}

fn default_max_passes() -> u32 {
    10
}

/// Pocket promotion configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromotionConfig {
    /// Minutes between a promote-to-updates release and promote-to-security.
    #[serde(default = "default_security_dwell_minutes")]
    pub security_dwell_minutes: u32,
    /// Hold production promotions from Friday 18:00 to Sunday 21:00 UTC.
    #[serde(default)]
    pub weekend_hold: bool,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            security_dwell_minutes: default_security_dwell_minutes(),
            weekend_hold: false,
        }
    }
}

fn default_security_dwell_minutes() -> u32 {
    60
}

/// Workflow aggregator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// Minutes a complete bug is held open after its last phase change.
    #[serde(default = "default_final_close_delay_minutes")]
    pub final_close_delay_minutes: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            final_close_delay_minutes: default_final_close_delay_minutes(),
        }
    }
}

fn default_final_close_delay_minutes() -> u32 {
    60
}

/// Test results feed configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TestResultsConfig {
    /// Re-poll delay after the feed could not be read.
    #[serde(default = "default_retry_minutes")]
    pub retry_minutes: u32,
}

impl Default for TestResultsConfig {
    fn default() -> Self {
        Self {
            retry_minutes: default_retry_minutes(),
        }
    }
}

fn default_retry_minutes() -> u32 {
    15
}

/// `["YYYY-MM-DD HH:MM", "YYYY-MM-DD HH:MM"]`, UTC, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TimeWindow(pub String, pub String);

/// Release policy configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub deployment_blackout: Vec<TimeWindow>,
    #[serde(default)]
    pub development_freeze: Vec<TimeWindow>,
    /// Cycles released for promotion to -updates/-security.
    #[serde(default)]
    pub ready_cycles: Vec<String>,
    /// source package -> packages that must already be in the archive.
    #[serde(default)]
    pub companion_packages: BTreeMap<String, Vec<String>>,
}
