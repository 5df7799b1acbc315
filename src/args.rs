//! Command line argument parsing for the profile switcher

use crate::backend::BackendKind;
use crate::profile::ProfileId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Performance profile switcher
///
/// Keeps track of the asusd platform profile and switches between Quiet,
/// Balanced and Performance.
#[derive(Parser, Debug)]
#[command(name = "perf-switcher")]
#[command(about = "Performance profile switcher")]
#[command(version)]
pub struct Args {
    /// Increase verbosity (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Backend used to reach the daemon: dbus or cli
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// Path to the configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Follow profile changes until interrupted (default)
    Watch,
    /// Print the active profile
    Get,
    /// List the profiles supported by the daemon
    List,
    /// Switch to a profile
    Set {
        /// Quiet, Balanced or Performance
        profile: ProfileId,
    },
    /// Print the effective configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        init: bool,
    },
}
