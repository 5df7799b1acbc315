//! Backend adapters that talk to the platform daemon

pub mod cli;
pub mod dbus;

use crate::config::SwitcherConfig;
use crate::errors::Result;
use crate::profile::{ProfileCatalog, ProfileId};
use async_trait::async_trait;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use cli::CliBackend;
pub use dbus::DbusBackend;

/// The three primitive operations the sync engine needs from the daemon.
///
/// Implementations normalize whatever the daemon speaks into `ProfileId`.
/// Transport problems surface as `Io`/`DBus`/`Transport` errors, and output or
/// values that don't decode to a known profile as `Parse`.
#[async_trait]
pub trait ProfileBackend: Send + Sync {
    /// Short name used in log messages
    fn name(&self) -> &'static str;

    async fn list_supported(&self) -> Result<ProfileCatalog>;

    async fn get_current(&self) -> Result<ProfileId>;

    async fn set_current(&self, profile: ProfileId) -> Result<()>;
}

/// Which backend to talk through; chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Dbus,
    Cli,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Dbus => f.write_str("dbus"),
            BackendKind::Cli => f.write_str("cli"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = crate::errors::PerfSwitchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dbus" => Ok(BackendKind::Dbus),
            "cli" => Ok(BackendKind::Cli),
            other => Err(crate::errors::PerfSwitchError::Config(format!(
                "unknown backend '{}', expected 'dbus' or 'cli'",
                other
            ))),
        }
    }
}

/// Build the configured backend.
///
/// Nothing is contacted here; connection problems show up as failures of the
/// first operations, where the retry executor handles them.
pub fn connect(config: &SwitcherConfig) -> Arc<dyn ProfileBackend> {
    let backend: Arc<dyn ProfileBackend> = match config.backend {
        BackendKind::Dbus => Arc::new(DbusBackend::new()),
        BackendKind::Cli => Arc::new(CliBackend::new(config.cli.clone())),
    };
    info!("Using {} backend", backend.name());
    backend
}
