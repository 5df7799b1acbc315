//! Persistent configuration for the profile switcher

use crate::backend::BackendKind;
use crate::errors::{PerfSwitchError, Result};
use crate::retry::RetryPolicy;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable selecting the backend (`dbus` or `cli`)
pub const ENV_BACKEND: &str = "PERF_SWITCHER_BACKEND";
/// Environment variable overriding the command line tool path
pub const ENV_CLI_PROGRAM: &str = "PERF_SWITCHER_CLI";

/// How the command line backend invokes its tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub program: String,
    pub list_args: Vec<String>,
    pub get_args: Vec<String>,
    /// The target profile name is appended to these
    pub set_args: Vec<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            program: "asusctl".to_string(),
            list_args: vec!["profile".to_string(), "-l".to_string()],
            get_args: vec!["profile".to_string(), "-p".to_string()],
            set_args: vec!["profile".to_string(), "-P".to_string()],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitcherConfig {
    pub backend: BackendKind,
    pub retry: RetryPolicy,
    pub cli: CliConfig,
}

impl SwitcherConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: SwitcherConfig = serde_json::from_str(&json)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    /// Load `path` if it exists, otherwise start from defaults; then apply env overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            debug!("Loading configuration from {}", path.display());
            Self::load_from_file(path).map_err(|e| {
                PerfSwitchError::Config(format!("failed to load {}: {}", path.display(), e))
            })?
        } else {
            debug!("No configuration at {}, using defaults", path.display());
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(backend) = var(ENV_BACKEND) {
            self.backend = backend.parse()?;
        }
        if let Some(program) = var(ENV_CLI_PROGRAM) {
            self.cli.program = program;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(PerfSwitchError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.cli.program.trim().is_empty() {
            return Err(PerfSwitchError::Config("cli.program must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn get_config_path() -> PathBuf {
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        base.join("perf-switcher").join("config.json")
    }
}
