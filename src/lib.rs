//! Performance Profile Switcher
//!
//! Keeps a local view of the asusd platform profile in sync with the daemon
//! and serializes profile switches through a single event loop.

pub mod args;
pub mod backend;
pub mod client;
pub mod config;
pub mod engine;
pub mod errors;
pub mod indicator;
pub mod logging;
pub mod notifier;
pub mod profile;
pub mod retry;
pub mod store;
pub mod subscriber;

#[cfg(test)]
mod testing;

// DBus constants for the asusd platform interface
pub const DBUS_SERVICE_NAME: &str = "xyz.ljones.Asusd";
pub const DBUS_OBJECT_PATH: &str = "/xyz/ljones";
pub const DBUS_INTERFACE_NAME: &str = "xyz.ljones.Platform";
pub const DBUS_PROFILE_PROPERTY: &str = "PlatformProfile";

// Re-export commonly used types
pub use engine::{EngineHandle, EnginePhase, RequestOutcome, RunningEngine, SyncEngine};
pub use errors::{ErrorKind, PerfSwitchError, Result};
pub use profile::{ProfileCatalog, ProfileId};
pub use store::SyncState;
