//! Scripted collaborators for engine tests

use crate::backend::ProfileBackend;
use crate::errors::{PerfSwitchError, Result};
use crate::notifier::FailureNotifier;
use crate::profile::{ProfileCatalog, ProfileId};
use crate::subscriber::{ChangeFeed, ProfileSink, Subscription};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub fn transport_error() -> PerfSwitchError {
    PerfSwitchError::Transport("daemon unreachable".to_string())
}

/// Backend that replays queued results, then succeeds with defaults:
/// the built-in catalog, `Balanced`, and accepting every switch.
#[derive(Default)]
pub struct ScriptedBackend {
    list: Mutex<VecDeque<Result<ProfileCatalog>>>,
    current: Mutex<VecDeque<Result<ProfileId>>>,
    set: Mutex<VecDeque<Result<()>>>,
    list_calls: AtomicU32,
    current_calls: AtomicU32,
    set_targets: Mutex<Vec<ProfileId>>,
}

impl ScriptedBackend {
    pub fn push_list(&self, result: Result<ProfileCatalog>) {
        self.list.lock().unwrap().push_back(result);
    }

    pub fn push_current(&self, result: Result<ProfileId>) {
        self.current.lock().unwrap().push_back(result);
    }

    pub fn push_set(&self, result: Result<()>) {
        self.set.lock().unwrap().push_back(result);
    }

    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn current_calls(&self) -> u32 {
        self.current_calls.load(Ordering::SeqCst)
    }

    pub fn set_calls(&self) -> usize {
        self.set_targets.lock().unwrap().len()
    }

    pub fn set_targets(&self) -> Vec<ProfileId> {
        self.set_targets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn list_supported(&self) -> Result<ProfileCatalog> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.list.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ProfileCatalog::builtin()))
    }

    async fn get_current(&self) -> Result<ProfileId> {
        self.current_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.current.lock().unwrap().pop_front();
        next.unwrap_or(Ok(ProfileId::Balanced))
    }

    async fn set_current(&self, profile: ProfileId) -> Result<()> {
        self.set_targets.lock().unwrap().push(profile);
        let next = self.set.lock().unwrap().pop_front();
        next.unwrap_or(Ok(()))
    }
}

/// Change feed whose notifications are pushed by the test
#[derive(Default)]
pub struct ManualFeed {
    sink: Mutex<Option<ProfileSink>>,
    subscribe_calls: AtomicU32,
    live: Arc<AtomicBool>,
}

struct LiveGuard(Arc<AtomicBool>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ManualFeed {
    pub fn push(&self, profile: ProfileId) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink(profile);
        }
    }

    pub fn subscribe_calls(&self) -> u32 {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    /// `true` while the subscription task handed to the engine is alive
    pub fn is_subscribed(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeFeed for ManualFeed {
    async fn subscribe(&self, sink: ProfileSink) -> Result<Subscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        self.live.store(true, Ordering::SeqCst);
        let guard = LiveGuard(self.live.clone());
        Ok(Subscription::new(tokio::spawn(async move {
            let _guard = guard;
            std::future::pending::<()>().await;
        })))
    }
}

/// Notifier that keeps every (title, body) pair it was given
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

impl FailureNotifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
    }
}
