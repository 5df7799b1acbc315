//! Logging setup for the profile switcher

use fern::Dispatch;
use log::LevelFilter;

/// Setup logging with the specified verbosity level.
///
/// Logs go to stderr so stdout stays clean for `get` and `list` output.
pub fn setup(verbosity: u8) -> Result<(), fern::InitError> {
    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_for(verbosity))
        .level_for("zbus", level_for(verbosity.saturating_sub(1)))
        .chain(std::io::stderr())
        .apply()?;

    Ok(())
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
