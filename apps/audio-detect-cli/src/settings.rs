//! Monitor configuration loading
//!
//! Resolution order:
//! 1. a JSON file passed as the first command line argument
//! 2. `config.json` in the platform config directory, if present
//! 3. built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use audio_detect_monitor::MonitorConfig;

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "audio-detect";
const APP_NAME: &str = "audio-detect";
const CONFIG_FILE: &str = "config.json";

/// Default location of the config file, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// Load the monitor configuration for this run
pub fn load(explicit: Option<&Path>) -> Result<MonitorConfig> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => read_config(&path),
        _ => {
            tracing::debug!("No config file found, using defaults");
            Ok(MonitorConfig::default())
        }
    }
}

fn read_config(path: &Path) -> Result<MonitorConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_config(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    tracing::info!(path = %path.display(), "Loaded monitor config");
    Ok(config)
}

fn parse_config(contents: &str) -> Result<MonitorConfig> {
    let config: MonitorConfig = serde_json::from_str(contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_parse_partial_config() {
        let config = parse_config(r#"{ "pollInterval": 500 }"#).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!(config.churn_detection);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        assert!(parse_config(r#"{ "pollInterval": 0 }"#).is_err());
        assert!(parse_config("not json").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = load(Some(Path::new("/definitely/not/here.json"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
