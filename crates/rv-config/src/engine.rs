//! Engine configuration
//!
//! Parses the top-level `revolution.yaml`.

use rv_core::{routines, RoutineName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// One account (independent session) to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name, used in log fields and state file names
    pub name: String,

    /// Input target (process ID of the game client)
    #[serde(default)]
    pub target: u32,
}

/// An interval interrupt to register with every session's scheduler
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalConfig {
    /// Routine redirected to when the interrupt fires
    pub routine: RoutineName,

    /// Fire at most once per this many ticks
    pub every_ticks: u64,

    /// Lower values win ties
    #[serde(default)]
    pub priority: i32,

    /// Settings path of a boolean that enables the interrupt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<String>,
}

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scheduler period in milliseconds
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Pause a session when a step reports an error
    #[serde(default = "default_true")]
    pub pause_on_error: bool,

    /// Routine every session starts in
    #[serde(default = "default_entry_routine")]
    pub entry_routine: RoutineName,

    /// Start the entry routine over when it runs out of steps
    #[serde(default = "default_true")]
    pub repeat_entry: bool,

    /// Routine redirected to when the session's window is lost
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_routine: Option<RoutineName>,

    /// Directory holding settings and state files (relative to the config file)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Accounts to run
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Interval interrupts
    #[serde(default)]
    pub intervals: Vec<IntervalConfig>,
}

fn default_tick_ms() -> u64 {
    rv_core::CLOCK_PERIOD.as_millis() as u64
}

fn default_true() -> bool {
    true
}

fn default_entry_routine() -> RoutineName {
    RoutineName::from(routines::MAIN)
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            pause_on_error: true,
            entry_routine: default_entry_routine(),
            repeat_entry: true,
            recovery_routine: None,
            data_dir: default_data_dir(),
            accounts: Vec::new(),
            intervals: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Load the engine configuration from a YAML file
    ///
    /// A relative `data_dir` is resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let value = load_yaml(path)?;
        let mut config: EngineConfig =
            serde_yaml::from_value(value).map_err(|e| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source: e,
            })?;

        if config.data_dir.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.data_dir = base.join(&config.data_dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tick_ms == 0 {
            return Err(ConfigError::ValidationFailed {
                message: "tick_ms must be greater than zero".to_string(),
            });
        }
        if let Some(ivl) = self.intervals.iter().find(|i| i.every_ticks == 0) {
            return Err(ConfigError::ValidationFailed {
                message: format!("interval for {} must have every_ticks > 0", ivl.routine),
            });
        }
        let mut names: Vec<&str> = self.accounts.iter().map(|a| a.name.as_str()).collect();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::ValidationFailed {
                message: format!("duplicate account '{}'", dup[0]),
            });
        }
        Ok(())
    }

    /// Scheduler period
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Settings file shared by all accounts
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join("settings.yaml")
    }

    /// Persisted state file of one account
    pub fn state_path(&self, account: &str) -> PathBuf {
        self.data_dir.join(format!("state.{account}.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config: EngineConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.tick_ms, 50);
        assert!(config.pause_on_error);
        assert!(config.repeat_entry);
        assert_eq!(config.entry_routine.as_str(), "Main");
        assert!(config.recovery_routine.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("revolution.yaml");
        fs::write(
            &path,
            r#"
tick_ms: 100
recovery_routine: OpenRoblox
data_dir: data
accounts:
  - name: main
    target: 4242
intervals:
  - routine: Planters
    every_ticks: 72000
    priority: 2
    enabled: planters.enabled
"#,
        )
        .unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.tick(), Duration::from_millis(100));
        assert_eq!(config.recovery_routine.as_ref().unwrap().as_str(), "OpenRoblox");
        assert_eq!(config.accounts[0].target, 4242);
        assert_eq!(config.intervals[0].enabled.as_deref(), Some("planters.enabled"));
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(
            config.state_path("main"),
            dir.path().join("data").join("state.main.yaml")
        );
    }

    #[test]
    fn test_validation() {
        let config: EngineConfig = serde_yaml::from_str("tick_ms: 0").unwrap();
        assert!(config.validate().is_err());

        let config: EngineConfig =
            serde_yaml::from_str("accounts: [{name: a}, {name: a}]").unwrap();
        assert!(config.validate().is_err());

        let config: EngineConfig =
            serde_yaml::from_str("intervals: [{routine: X, every_ticks: 0}]").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_routine_name_rejected() {
        let result: Result<EngineConfig, _> = serde_yaml::from_str("entry_routine: 'bad name'");
        assert!(result.is_err());
    }
}
