//! User-visible failure signal

use crate::profile::ProfileId;
use log::error;

/// Title of every failure notification
pub const NOTIFICATION_TITLE: &str = "Perf Switcher";

/// Body shown when a profile switch ran out of retries
pub fn switch_failed_message(profile: ProfileId) -> String {
    format!(
        "Failed to switch to {} profile. Please try again or check system logs.",
        profile
    )
}

/// Presentation-side sink for failures the user has to see
pub trait FailureNotifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Writes notifications to stderr and the error log
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl FailureNotifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) {
        error!("{}: {}", title, body);
        eprintln!("{}: {}", title, body);
    }
}
