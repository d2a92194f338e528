use super::{types::EngineConfig, ConfigError};
use crate::providers::parse_window;

/// Validate configuration
/// Currently validates:
/// - engine.max_passes is not 0
/// - test_results.retry_minutes is not 0
/// - every policy window parses and starts before it ends
pub fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.engine.max_passes == 0 {
        return Err(ConfigError::ValidationError(
            "engine.max_passes cannot be 0".to_string(),
        ));
    }

    if config.test_results.retry_minutes == 0 {
        return Err(ConfigError::ValidationError(
            "test_results.retry_minutes cannot be 0".to_string(),
        ));
    }

    for window in config
        .policy
        .deployment_blackout
        .iter()
        .chain(config.policy.development_freeze.iter())
    {
        parse_window(window)?;
    }

    Ok(())
}
