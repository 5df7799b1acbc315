//! Main entry point for the profile switcher

use anyhow::Context;
use clap::Parser;
use log::debug;
use perf_switcher::{
    args::{Args, Commands},
    client::SwitcherClient,
    config::SwitcherConfig,
    logging,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    logging::setup(args.verbose).context("failed to set up logging")?;
    debug!(
        "perf-switcher v{} (git {}) built {}",
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown")
    );

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(SwitcherConfig::get_config_path);
    let mut config = SwitcherConfig::load(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    let client = SwitcherClient::new(config, config_path);
    client
        .handle_command(args.command.unwrap_or(Commands::Watch))
        .await?;

    Ok(())
}
