//! Command handling for the profile switcher binary

use crate::{
    args::Commands,
    backend,
    config::SwitcherConfig,
    engine::{EngineHandle, EnginePhase, RequestOutcome, RunningEngine, SyncEngine},
    errors::{PerfSwitchError, Result},
    indicator::IndicatorView,
    notifier::ConsoleNotifier,
    profile::ProfileId,
    store::SyncState,
    subscriber::DbusChangeFeed,
};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

/// Drives a sync engine on behalf of one command line invocation
pub struct SwitcherClient {
    config: SwitcherConfig,
    config_path: PathBuf,
}

impl SwitcherClient {
    pub fn new(config: SwitcherConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Handle CLI commands
    pub async fn handle_command(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Watch => self.watch().await,
            Commands::Get => self.get().await,
            Commands::List => self.list().await,
            Commands::Set { profile } => self.set(profile).await,
            Commands::Config { init } => self.show_config(init),
        }
    }

    async fn start_engine(&self, print_changes: bool) -> Result<RunningEngine> {
        let backend = backend::connect(&self.config);
        let mut engine = SyncEngine::new(
            backend,
            Arc::new(DbusChangeFeed::new()),
            Arc::new(ConsoleNotifier),
            self.config.retry,
        )?;
        if print_changes {
            engine.add_observer(Box::new(|state: &SyncState| {
                if state.active_profile.is_some() {
                    println!("{}", IndicatorView::from_state(state));
                }
            }));
        }
        Ok(engine.start())
    }

    async fn ready(engine: &RunningEngine) -> Result<EngineHandle> {
        let handle = engine.handle();
        match handle.wait_ready().await {
            EnginePhase::Stopped => Err(PerfSwitchError::EngineStopped),
            _ => Ok(handle),
        }
    }

    /// Follow the daemon until Ctrl-C
    async fn watch(&self) -> Result<()> {
        let engine = self.start_engine(true).await?;
        Self::ready(&engine).await?;
        info!("Watching for profile changes, press Ctrl-C to stop");

        tokio::signal::ctrl_c().await?;
        debug!("Interrupted, shutting down");
        engine.shutdown().await;
        Ok(())
    }

    async fn get(&self) -> Result<()> {
        let engine = self.start_engine(false).await?;
        let state = Self::ready(&engine).await?.current();
        engine.shutdown().await;

        match state.active_profile {
            Some(profile) => println!("{}", profile),
            None => println!("unknown"),
        }
        Ok(())
    }

    async fn list(&self) -> Result<()> {
        let engine = self.start_engine(false).await?;
        let state = Self::ready(&engine).await?.current();
        engine.shutdown().await;

        for profile in state.catalog.profiles() {
            let marker = if state.active_profile == Some(*profile) {
                "*"
            } else {
                " "
            };
            println!("{} {}", marker, profile);
        }
        Ok(())
    }

    async fn set(&self, profile: ProfileId) -> Result<()> {
        let engine = self.start_engine(false).await?;
        let handle = Self::ready(&engine).await?;
        let outcome = handle.request_profile(profile).await;
        engine.shutdown().await;

        match outcome? {
            RequestOutcome::Unchanged => {
                println!("{} profile already active", profile);
                Ok(())
            }
            RequestOutcome::Switched => {
                println!("Switched to {} profile", profile);
                Ok(())
            }
            RequestOutcome::Failed => Err(PerfSwitchError::Transport(format!(
                "could not switch to {} profile",
                profile
            ))),
            RequestOutcome::Unsupported => Err(PerfSwitchError::UnknownProfile(format!(
                "{} is not supported by this device",
                profile
            ))),
        }
    }

    fn show_config(&self, init: bool) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(&self.config)?);
        if init {
            self.config.save_to_file(&self.config_path)?;
        }
        Ok(())
    }
}
