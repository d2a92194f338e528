use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::EngineConfig, ConfigError};

/// Read `path` as TOML, then layer `SWM_`-prefixed environment variables
/// on top. Nested keys use a double underscore, e.g.
/// `SWM_PROMOTION__WEEKEND_HOLD=true`.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: EngineConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("SWM_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Parse a TOML document without consulting the environment.
pub fn load_config_from_str(toml_str: &str) -> Result<EngineConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[engine]
max_passes = 4

[workflow]
final_close_delay_minutes = 0
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.engine.max_passes, 4);
        assert_eq!(config.workflow.final_close_delay_minutes, 0);
    }

    #[test]
    fn test_load_config_from_str_bad_type() {
        let toml = r#"
[engine]
max_passes = "many"
"#;
        let result = load_config_from_str(toml);
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/swm.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[promotion]
security_dwell_minutes = 120

[policy]
ready_cycles = ["2024.12.02"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.promotion.security_dwell_minutes, 120);
        assert_eq!(config.policy.ready_cycles, vec!["2024.12.02".to_string()]);
    }
}
