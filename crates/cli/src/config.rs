use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use runbook_engine::loader::expand_tilde;
use serde::{Deserialize, Serialize};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "RUNBOOK_CONFIG_PATH";

/// Scenario used when neither the command line nor the config names one.
pub const FALLBACK_SCENARIO: &str = "scenario.yaml";

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunbookConfig {
    /// Scenario file used when the command line does not name one.
    #[serde(default)]
    pub default_scenario: Option<PathBuf>,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
}

impl RunbookConfig {
    /// Loads the config from [`default_config_path`], falling back to defaults
    /// when the file is missing or unparsable.
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        if let Ok(content) = fs::read_to_string(path)
            && let Ok(config) = serde_json::from_str(&content)
        {
            return config;
        }
        RunbookConfig::default()
    }

    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Picks the scenario to run: explicit argument, then config, then
    /// [`FALLBACK_SCENARIO`].
    pub fn scenario_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| self.default_scenario.clone())
            .unwrap_or_else(|| PathBuf::from(FALLBACK_SCENARIO))
    }
}

/// Get the default path for the runbook configuration file.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde(&path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("runbook")
        .join("config.json")
}
