//! Single owner of the synchronized profile state

use crate::errors::ErrorKind;
use crate::profile::{ProfileCatalog, ProfileId};
use log::debug;
use serde::Serialize;

/// Snapshot of everything the switcher knows about the daemon
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncState {
    /// `None` only until the first fetch has resolved
    pub active_profile: Option<ProfileId>,
    pub catalog: ProfileCatalog,
    pub last_error: Option<ErrorKind>,
}

/// Receives every state change the store commits.
///
/// Observers only see an immutable snapshot; they cannot reach back into the
/// store, so a notification can never trigger a nested mutation.
pub trait StateObserver: Send {
    fn state_changed(&mut self, state: &SyncState);
}

impl<F> StateObserver for F
where
    F: FnMut(&SyncState) + Send,
{
    fn state_changed(&mut self, state: &SyncState) {
        self(state)
    }
}

/// Holds `SyncState` and notifies observers on actual changes.
///
/// The store is owned by the sync engine's event loop, so mutation and
/// notification always happen within one turn and need no locking.
#[derive(Default)]
pub struct ProfileStateStore {
    state: SyncState,
    observers: Vec<Box<dyn StateObserver>>,
}

impl ProfileStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer; observers are notified in registration order
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.observers.push(observer);
    }

    pub fn current(&self) -> &SyncState {
        &self.state
    }

    pub fn active_profile(&self) -> Option<ProfileId> {
        self.state.active_profile
    }

    /// Returns `true` if the active profile changed
    pub fn set_active(&mut self, profile: ProfileId) -> bool {
        if self.state.active_profile == Some(profile) {
            return false;
        }
        debug!(
            "Active profile {:?} -> {}",
            self.state.active_profile.map(ProfileId::name),
            profile
        );
        self.state.active_profile = Some(profile);
        self.notify();
        true
    }

    /// Returns `true` if the catalog changed
    pub fn set_catalog(&mut self, catalog: ProfileCatalog) -> bool {
        if self.state.catalog == catalog {
            return false;
        }
        debug!("Profile catalog set to {:?}", catalog.profiles());
        self.state.catalog = catalog;
        self.notify();
        true
    }

    /// Record (or clear, with `None`) the kind of the most recent terminal failure
    pub fn set_last_error(&mut self, error: Option<ErrorKind>) -> bool {
        if self.state.last_error == error {
            return false;
        }
        self.state.last_error = error;
        self.notify();
        true
    }

    fn notify(&mut self) {
        for observer in self.observers.iter_mut() {
            observer.state_changed(&self.state);
        }
    }
}
