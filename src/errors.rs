//! Error types for the performance profile switcher

use serde::Serialize;
use thiserror::Error;

/// Result type alias for the profile switcher
pub type Result<T> = std::result::Result<T, PerfSwitchError>;

/// Main error type for the profile switcher
#[derive(Error, Debug)]
pub enum PerfSwitchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DBus error: {0}")]
    DBus(#[from] zbus::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync engine is not running")]
    EngineStopped,
}

impl PerfSwitchError {
    /// Classify the error for retry bookkeeping and `SyncState::last_error`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PerfSwitchError::Io(_) | PerfSwitchError::DBus(_) | PerfSwitchError::Transport(_) => {
                ErrorKind::Transport
            }
            PerfSwitchError::Parse(_) => ErrorKind::Parse,
            PerfSwitchError::UnknownProfile(_) => ErrorKind::UnknownProfile,
            PerfSwitchError::Serialization(_)
            | PerfSwitchError::Config(_)
            | PerfSwitchError::EngineStopped => ErrorKind::Internal,
        }
    }
}

/// Coarse error classes recorded in the synchronized state.
///
/// Transport, parse and unknown-profile failures share one retry policy;
/// only their detection differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    Transport,
    Parse,
    UnknownProfile,
    Internal,
}

/// Outcome of a retry sequence that did not produce a value
#[derive(Error, Debug)]
pub enum RetryError {
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Exhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: PerfSwitchError,
    },

    #[error("retry sequence cancelled")]
    Cancelled,
}

impl RetryError {
    /// Error kind of the last failed attempt, if the sequence ran to exhaustion
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            RetryError::Exhausted { source, .. } => Some(source.kind()),
            RetryError::Cancelled => None,
        }
    }
}
