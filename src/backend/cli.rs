//! Subprocess backend driving the `asusctl` command line tool

use super::ProfileBackend;
use crate::config::CliConfig;
use crate::errors::{PerfSwitchError, Result};
use crate::profile::{ProfileCatalog, ProfileId};
use async_trait::async_trait;
use log::{debug, trace};
use regex::Regex;
use std::sync::OnceLock;
use tokio::process::Command;

/// Line-oriented backend: one subprocess per operation, parsed from stdout
pub struct CliBackend {
    config: CliConfig,
}

impl CliBackend {
    pub fn new(config: CliConfig) -> Self {
        Self { config }
    }

    /// Run the tool to completion and return its stdout.
    ///
    /// The child is always awaited, so a retry never overlaps a previous process.
    async fn run(&self, args: &[String]) -> Result<String> {
        debug!("Running {} {}", self.config.program, args.join(" "));

        let output = Command::new(&self.config.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                PerfSwitchError::Transport(format!("failed to run {}: {}", self.config.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PerfSwitchError::Transport(format!(
                "{} exited with {}: {}",
                self.config.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| PerfSwitchError::Parse(format!("non UTF-8 output: {}", e)))?;
        trace!("{} stdout: {:?}", self.config.program, stdout);
        Ok(stdout)
    }
}

#[async_trait]
impl ProfileBackend for CliBackend {
    fn name(&self) -> &'static str {
        "cli"
    }

    async fn list_supported(&self) -> Result<ProfileCatalog> {
        let stdout = self.run(&self.config.list_args).await?;
        Ok(parse_profile_list(&stdout))
    }

    async fn get_current(&self) -> Result<ProfileId> {
        let stdout = self.run(&self.config.get_args).await?;
        parse_active_profile(&stdout)
    }

    async fn set_current(&self, profile: ProfileId) -> Result<()> {
        let mut args = self.config.set_args.clone();
        args.push(profile.name().to_string());
        // Exit status alone signals success; output is informational.
        self.run(&args).await.map(|_| ())
    }
}

fn active_profile_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*Active profile is\s+(\S+)\s*$").expect("active profile pattern is valid")
    })
}

/// Extract the profile from the `Active profile is <Name>` line
pub fn parse_active_profile(stdout: &str) -> Result<ProfileId> {
    let captures = active_profile_line()
        .captures(stdout)
        .ok_or_else(|| PerfSwitchError::Parse("no 'Active profile is' line in output".to_string()))?;
    captures[1]
        .parse()
        .map_err(|_| PerfSwitchError::Parse(format!("unrecognized active profile '{}'", &captures[1])))
}

/// Collect one profile name per line, skipping banners and unknown names
pub fn parse_profile_list(stdout: &str) -> ProfileCatalog {
    ProfileCatalog::new(stdout.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        match line.parse::<ProfileId>() {
            Ok(profile) => Some(profile),
            Err(_) => {
                trace!("Ignoring non-profile line: {:?}", line);
                None
            }
        }
    }))
}
