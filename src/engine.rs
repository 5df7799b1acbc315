//! Sync engine: discovery, push tracking and serialized profile requests
//!
//! Everything that touches `ProfileStateStore` runs on one task. Backend
//! calls, retry delays and push notifications run elsewhere and report back
//! through a single event queue, so state is never shared across tasks.

use crate::backend::ProfileBackend;
use crate::errors::{PerfSwitchError, Result, RetryError};
use crate::notifier::{switch_failed_message, FailureNotifier, NOTIFICATION_TITLE};
use crate::profile::{verify_code_table, ProfileCatalog, ProfileId};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::store::{ProfileStateStore, StateObserver, SyncState};
use crate::subscriber::{ChangeFeed, Subscription};
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Result of a `request_profile` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Target was already active; nothing was sent to the daemon
    Unchanged,
    Switched,
    /// Retries ran out; a failure notification was raised
    Failed,
    /// Target is not in the daemon's catalog
    Unsupported,
}

/// Lifecycle of the engine as seen by presentation code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Startup discovery still running; interaction should stay disabled
    Starting,
    Running,
    Stopped,
}

enum EngineEvent {
    Request {
        target: ProfileId,
        reply: oneshot::Sender<RequestOutcome>,
    },
    Refresh,
    Pushed(ProfileId),
    CatalogFetched(std::result::Result<ProfileCatalog, RetryError>),
    CurrentFetched(std::result::Result<ProfileId, RetryError>),
    Subscribed(Result<Subscription>),
    SetFinished {
        target: ProfileId,
        result: std::result::Result<(), RetryError>,
    },
    Shutdown,
}

struct PendingRequest {
    target: ProfileId,
    reply: oneshot::Sender<RequestOutcome>,
}

impl PendingRequest {
    fn resolve(self, outcome: RequestOutcome) {
        // The requester may have gone away; that is not an error for us.
        let _ = self.reply.send(outcome);
    }
}

/// Keeps the local profile state in sync with the platform daemon
pub struct SyncEngine {
    backend: Arc<dyn ProfileBackend>,
    feed: Arc<dyn ChangeFeed>,
    notifier: Arc<dyn FailureNotifier>,
    retry: RetryExecutor,
    store: ProfileStateStore,
    subscription: Option<Subscription>,
    subscribing: bool,
    discovering: bool,
    queue: VecDeque<PendingRequest>,
    in_flight: Option<PendingRequest>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: mpsc::UnboundedReceiver<EngineEvent>,
    state_rx: watch::Receiver<SyncState>,
    phase_tx: watch::Sender<EnginePhase>,
    phase_rx: watch::Receiver<EnginePhase>,
}

impl SyncEngine {
    /// Create an engine; the backend is fixed for the engine's lifetime
    pub fn new(
        backend: Arc<dyn ProfileBackend>,
        feed: Arc<dyn ChangeFeed>,
        notifier: Arc<dyn FailureNotifier>,
        policy: RetryPolicy,
    ) -> Result<Self> {
        verify_code_table()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SyncState::default());
        let (phase_tx, phase_rx) = watch::channel(EnginePhase::Starting);

        let mut store = ProfileStateStore::new();
        store.add_observer(Box::new(move |state: &SyncState| {
            state_tx.send_replace(state.clone());
        }));

        Ok(Self {
            backend,
            feed,
            notifier,
            retry: RetryExecutor::new(policy),
            store,
            subscription: None,
            subscribing: false,
            discovering: false,
            queue: VecDeque::new(),
            in_flight: None,
            events_tx,
            events_rx,
            state_rx,
            phase_tx,
            phase_rx,
        })
    }

    /// Register a state observer; must happen before `start`
    pub fn add_observer(&mut self, observer: Box<dyn StateObserver>) {
        self.store.add_observer(observer);
    }

    /// Spawn the event loop and kick off discovery without waiting for it
    pub fn start(self) -> RunningEngine {
        let handle = EngineHandle {
            events: self.events_tx.clone(),
            state: self.state_rx.clone(),
            phase: self.phase_rx.clone(),
        };
        let task = tokio::spawn(self.run());
        RunningEngine {
            handle,
            task: Some(task),
        }
    }

    async fn run(mut self) {
        info!("Sync engine starting with {} backend", self.backend.name());
        self.begin_discovery();

        while let Some(event) = self.events_rx.recv().await {
            if let EngineEvent::Shutdown = event {
                break;
            }
            self.handle_event(event);
        }

        self.shutdown();
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Request { target, reply } => {
                self.queue.push_back(PendingRequest { target, reply });
                self.drain_queue();
            }
            EngineEvent::Refresh => {
                if self.discovering {
                    debug!("Discovery already running, ignoring refresh");
                } else {
                    self.begin_discovery();
                }
            }
            EngineEvent::Pushed(profile) => {
                if self.store.set_active(profile) {
                    info!("Profile changed externally to {}", profile);
                }
            }
            EngineEvent::CatalogFetched(result) => self.on_catalog(result),
            EngineEvent::CurrentFetched(result) => self.on_current(result),
            EngineEvent::Subscribed(result) => self.on_subscribed(result),
            EngineEvent::SetFinished { target, result } => self.on_set_finished(target, result),
            EngineEvent::Shutdown => {}
        }
    }

    /// Step 1 of startup: fetch the catalog through the retry executor
    fn begin_discovery(&mut self) {
        self.discovering = true;
        let backend = self.backend.clone();
        let retry = self.retry.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = retry
                .run_with_retry("list supported profiles", || backend.list_supported())
                .await;
            let _ = events.send(EngineEvent::CatalogFetched(result));
        });
    }

    fn on_catalog(&mut self, result: std::result::Result<ProfileCatalog, RetryError>) {
        // A discovery that reaches the daemon supersedes errors from earlier rounds
        if result.is_ok() {
            self.store.set_last_error(None);
        }
        let catalog = match result {
            Ok(catalog) if catalog.is_empty() => {
                warn!("Daemon reported no known profiles, using built-in set");
                ProfileCatalog::builtin()
            }
            Ok(catalog) => catalog,
            Err(RetryError::Cancelled) => return,
            Err(e) => {
                warn!("{}; using built-in profile set", e);
                self.store.set_last_error(e.kind());
                ProfileCatalog::builtin()
            }
        };
        self.store.set_catalog(catalog);

        // Step 2: fetch the active profile
        let backend = self.backend.clone();
        let retry = self.retry.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = retry
                .run_with_retry("get current profile", || backend.get_current())
                .await;
            let _ = events.send(EngineEvent::CurrentFetched(result));
        });
    }

    fn on_current(&mut self, result: std::result::Result<ProfileId, RetryError>) {
        let profile = match result {
            Ok(profile) => {
                if !self.store.current().catalog.contains(profile) {
                    warn!(
                        "Daemon reports active profile {} outside its catalog {:?}",
                        profile,
                        self.store.current().catalog.profiles()
                    );
                }
                profile
            }
            Err(RetryError::Cancelled) => return,
            Err(e) => {
                error!("{}; assuming {}", e, ProfileId::DEFAULT);
                self.store.set_last_error(e.kind());
                ProfileId::DEFAULT
            }
        };
        self.store.set_active(profile);
        self.discovering = false;

        // Step 3: subscribe to push notifications, once per engine
        if self.subscription.is_none() && !self.subscribing {
            self.subscribing = true;
            let feed = self.feed.clone();
            let events = self.events_tx.clone();
            tokio::spawn(async move {
                let sink_events = events.clone();
                let result = feed
                    .subscribe(Box::new(move |profile: ProfileId| {
                        let _ = sink_events.send(EngineEvent::Pushed(profile));
                    }))
                    .await;
                let _ = events.send(EngineEvent::Subscribed(result));
            });
        }

        if *self.phase_rx.borrow() == EnginePhase::Starting {
            info!("Sync engine ready, active profile {}", profile);
            self.phase_tx.send_replace(EnginePhase::Running);
        }
        self.drain_queue();
    }

    fn on_subscribed(&mut self, result: Result<Subscription>) {
        self.subscribing = false;
        match result {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(e) => warn!(
                "Could not subscribe to profile changes, external switches will not be tracked: {}",
                e
            ),
        }
    }

    /// Start queued requests one at a time, never during discovery
    fn drain_queue(&mut self) {
        while self.in_flight.is_none() && !self.discovering {
            let Some(request) = self.queue.pop_front() else {
                break;
            };
            self.begin_request(request);
        }
    }

    fn begin_request(&mut self, request: PendingRequest) {
        let target = request.target;

        if self.store.active_profile() == Some(target) {
            debug!("{} already active, nothing to do", target);
            request.resolve(RequestOutcome::Unchanged);
            return;
        }
        if !self.store.current().catalog.contains(target) {
            warn!("{} is not supported by the daemon", target);
            request.resolve(RequestOutcome::Unsupported);
            return;
        }

        info!("Switching to {} profile", target);
        let backend = self.backend.clone();
        let retry = self.retry.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = retry
                .run_with_retry("set profile", || backend.set_current(target))
                .await;
            let _ = events.send(EngineEvent::SetFinished { target, result });
        });
        self.in_flight = Some(request);
    }

    fn on_set_finished(&mut self, target: ProfileId, result: std::result::Result<(), RetryError>) {
        let Some(request) = self.in_flight.take() else {
            return;
        };

        match result {
            Ok(()) => {
                // The push notification will confirm this later and be a no-op.
                self.store.set_active(target);
                self.store.set_last_error(None);
                request.resolve(RequestOutcome::Switched);
            }
            Err(RetryError::Cancelled) => {}
            Err(e) => {
                error!("{}", e);
                self.store.set_last_error(e.kind());
                self.notifier
                    .notify(NOTIFICATION_TITLE, &switch_failed_message(target));
                request.resolve(RequestOutcome::Failed);
            }
        }

        self.drain_queue();
    }

    fn shutdown(&mut self) {
        info!("Sync engine shutting down");
        self.retry.cancel();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        // Dropping the reply senders tells waiting callers the engine stopped.
        self.queue.clear();
        self.in_flight = None;
        self.phase_tx.send_replace(EnginePhase::Stopped);
    }
}

/// Cloneable front door to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    events: mpsc::UnboundedSender<EngineEvent>,
    state: watch::Receiver<SyncState>,
    phase: watch::Receiver<EnginePhase>,
}

impl EngineHandle {
    /// Latest committed state
    pub fn current(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every committed state change
    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    pub fn phase(&self) -> EnginePhase {
        *self.phase.borrow()
    }

    /// Wait until startup discovery finished (or the engine stopped)
    pub async fn wait_ready(&self) -> EnginePhase {
        let mut phase = self.phase.clone();
        loop {
            let current = *phase.borrow_and_update();
            if current != EnginePhase::Starting {
                return current;
            }
            if phase.changed().await.is_err() {
                return EnginePhase::Stopped;
            }
        }
    }

    /// Ask the daemon to switch profiles; requests are handled strictly in order
    pub async fn request_profile(&self, target: ProfileId) -> Result<RequestOutcome> {
        let (reply, outcome) = oneshot::channel();
        self.events
            .send(EngineEvent::Request { target, reply })
            .map_err(|_| PerfSwitchError::EngineStopped)?;
        outcome.await.map_err(|_| PerfSwitchError::EngineStopped)
    }

    /// Re-run catalog discovery and the active profile fetch
    pub fn refresh(&self) -> Result<()> {
        self.events
            .send(EngineEvent::Refresh)
            .map_err(|_| PerfSwitchError::EngineStopped)
    }
}

/// Owns the engine task; shuts it down when dropped
pub struct RunningEngine {
    handle: EngineHandle,
    task: Option<JoinHandle<()>>,
}

impl RunningEngine {
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Cancel pending retries, release the subscription and wait for the loop to exit
    pub async fn shutdown(mut self) {
        let _ = self.handle.events.send(EngineEvent::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sync engine task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for RunningEngine {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.handle.events.send(EngineEvent::Shutdown);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DbusBackend;
    use crate::testing::{transport_error, ManualFeed, RecordingNotifier, ScriptedBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fixture {
        backend: Arc<ScriptedBackend>,
        feed: Arc<ManualFeed>,
        notifier: Arc<RecordingNotifier>,
        notifications: Arc<AtomicUsize>,
    }

    impl Fixture {
        fn new(backend: ScriptedBackend) -> Self {
            Self {
                backend: Arc::new(backend),
                feed: Arc::new(ManualFeed::default()),
                notifier: Arc::new(RecordingNotifier::default()),
                notifications: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn start(&self) -> RunningEngine {
            let mut engine = SyncEngine::new(
                self.backend.clone(),
                self.feed.clone(),
                self.notifier.clone(),
                RetryPolicy::default(),
            )
            .unwrap();
            let notifications = self.notifications.clone();
            engine.add_observer(Box::new(move |_: &SyncState| {
                notifications.fetch_add(1, Ordering::SeqCst);
            }));
            engine.start()
        }

        fn observed(&self) -> usize {
            self.notifications.load(Ordering::SeqCst)
        }
    }

    /// Events are handled in order, so once this answers every earlier event has been applied.
    async fn round_trip(handle: &EngineHandle) {
        let active = handle.current().active_profile.unwrap();
        assert_eq!(
            handle.request_profile(active).await.unwrap(),
            RequestOutcome::Unchanged
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_startup_discovers_catalog_and_profile() {
        let backend = ScriptedBackend::default();
        backend.push_list(Ok(ProfileCatalog::new([ProfileId::Quiet, ProfileId::Performance])));
        backend.push_current(Ok(ProfileId::Quiet));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        assert_eq!(handle.wait_ready().await, EnginePhase::Running);

        let state = handle.current();
        assert_eq!(state.active_profile, Some(ProfileId::Quiet));
        assert_eq!(
            state.catalog.profiles(),
            &[ProfileId::Quiet, ProfileId::Performance]
        );
        assert_eq!(state.last_error, None);

        round_trip(&handle).await;
        assert_eq!(fixture.feed.subscribe_calls(), 1);
        assert!(fixture.feed.is_subscribed());

        engine.shutdown().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!fixture.feed.is_subscribed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_failure_falls_back_silently() {
        let backend = ScriptedBackend::default();
        for _ in 0..3 {
            backend.push_list(Err(transport_error()));
        }
        backend.push_current(Ok(ProfileId::Balanced));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        let state = handle.current();
        assert_eq!(state.catalog, ProfileCatalog::builtin());
        assert_eq!(state.active_profile, Some(ProfileId::Balanced));
        assert_eq!(fixture.backend.list_calls(), 3);
        assert!(fixture.notifier.messages().is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_bus_is_retried_then_falls_back() {
        let feed = Arc::new(ManualFeed::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let engine = SyncEngine::new(
            Arc::new(DbusBackend::with_address("unix:path=/nonexistent/perf-switcher-test-bus")),
            feed.clone(),
            notifier.clone(),
            RetryPolicy::default(),
        )
        .unwrap()
        .start();
        let handle = engine.handle();
        assert_eq!(handle.wait_ready().await, EnginePhase::Running);

        let state = handle.current();
        assert_eq!(state.catalog, ProfileCatalog::builtin());
        assert_eq!(state.active_profile, Some(ProfileId::Balanced));
        assert_eq!(state.last_error, Some(crate::errors::ErrorKind::Transport));
        assert!(notifier.messages().is_empty());
        assert_eq!(feed.subscribe_calls(), 1);

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_refresh_clears_last_error() {
        let backend = ScriptedBackend::default();
        for _ in 0..3 {
            backend.push_list(Err(transport_error()));
        }
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;
        assert_eq!(
            handle.current().last_error,
            Some(crate::errors::ErrorKind::Transport)
        );

        let mut states = handle.watch_state();
        handle.refresh().unwrap();
        states
            .wait_for(|state| state.last_error.is_none())
            .await
            .unwrap();
        round_trip(&handle).await;

        assert_eq!(fixture.backend.list_calls(), 4);
        assert_eq!(fixture.backend.current_calls(), 2);
        assert_eq!(handle.current().last_error, None);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_catalog_falls_back_to_builtin() {
        let backend = ScriptedBackend::default();
        backend.push_list(Ok(ProfileCatalog::default()));
        backend.push_current(Ok(ProfileId::Performance));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        assert_eq!(handle.current().catalog, ProfileCatalog::builtin());
        assert_eq!(fixture.backend.list_calls(), 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_failure_defaults_to_balanced() {
        let backend = ScriptedBackend::default();
        for _ in 0..3 {
            backend.push_current(Err(PerfSwitchError::Parse("garbage".into())));
        }
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        let state = handle.current();
        assert_eq!(state.active_profile, Some(ProfileId::Balanced));
        assert_eq!(state.last_error, Some(crate::errors::ErrorKind::Parse));
        assert_eq!(fixture.backend.current_calls(), 3);
        assert!(fixture.notifier.messages().is_empty());

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_requesting_active_profile_is_a_noop() {
        let backend = ScriptedBackend::default();
        backend.push_current(Ok(ProfileId::Quiet));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;
        let before = fixture.observed();

        for _ in 0..3 {
            assert_eq!(
                handle.request_profile(ProfileId::Quiet).await.unwrap(),
                RequestOutcome::Unchanged
            );
        }

        assert_eq!(fixture.backend.set_calls(), 0);
        assert_eq!(fixture.observed(), before);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_request_updates_store_directly() {
        let backend = ScriptedBackend::default();
        backend.push_current(Ok(ProfileId::Balanced));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        assert_eq!(
            handle.request_profile(ProfileId::Performance).await.unwrap(),
            RequestOutcome::Switched
        );
        assert_eq!(handle.current().active_profile, Some(ProfileId::Performance));
        assert_eq!(fixture.backend.set_targets(), vec![ProfileId::Performance]);

        // The confirming push notification arrives late and changes nothing.
        let before = fixture.observed();
        fixture.feed.push(ProfileId::Performance);
        round_trip(&handle).await;
        assert_eq!(fixture.observed(), before);

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_leaves_state_and_notifies_once() {
        let backend = ScriptedBackend::default();
        backend.push_current(Ok(ProfileId::Quiet));
        for _ in 0..3 {
            backend.push_set(Err(transport_error()));
        }
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        assert_eq!(
            handle.request_profile(ProfileId::Performance).await.unwrap(),
            RequestOutcome::Failed
        );

        let state = handle.current();
        assert_eq!(state.active_profile, Some(ProfileId::Quiet));
        assert_eq!(state.last_error, Some(crate::errors::ErrorKind::Transport));
        assert_eq!(fixture.backend.set_calls(), 3);
        assert_eq!(
            fixture.notifier.messages(),
            vec![(
                NOTIFICATION_TITLE.to_string(),
                "Failed to switch to Performance profile. Please try again or check system logs."
                    .to_string()
            )]
        );

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_change_is_applied() {
        let backend = ScriptedBackend::default();
        backend.push_current(Ok(ProfileId::Balanced));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;
        round_trip(&handle).await;

        let mut states = handle.watch_state();
        states.borrow_and_update();
        fixture.feed.push(ProfileId::Quiet);
        states.changed().await.unwrap();

        assert_eq!(handle.current().active_profile, Some(ProfileId::Quiet));
        assert_eq!(fixture.backend.current_calls(), 1);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_during_startup_waits_for_discovery() {
        let backend = ScriptedBackend::default();
        backend.push_list(Err(transport_error()));
        backend.push_list(Err(transport_error()));
        backend.push_current(Ok(ProfileId::Balanced));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        assert_eq!(handle.phase(), EnginePhase::Starting);

        let outcome = handle.request_profile(ProfileId::Quiet).await.unwrap();
        assert_eq!(outcome, RequestOutcome::Switched);
        assert_eq!(fixture.backend.list_calls(), 3);
        assert_eq!(handle.current().active_profile, Some(ProfileId::Quiet));

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_profile_is_rejected() {
        let backend = ScriptedBackend::default();
        backend.push_list(Ok(ProfileCatalog::new([ProfileId::Balanced, ProfileId::Quiet])));
        backend.push_current(Ok(ProfileId::Balanced));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;

        assert_eq!(
            handle.request_profile(ProfileId::Performance).await.unwrap(),
            RequestOutcome::Unsupported
        );
        assert_eq!(fixture.backend.set_calls(), 0);
        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_mid_retry_cancels_pending_attempts() {
        let backend = ScriptedBackend::default();
        for _ in 0..3 {
            backend.push_list(Err(transport_error()));
        }
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        tokio::time::sleep(Duration::from_millis(500)).await;
        engine.shutdown().await;

        // Let any timer that might have survived fire.
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(fixture.backend.list_calls(), 1);
        assert_eq!(fixture.backend.current_calls(), 0);
        assert_eq!(fixture.feed.subscribe_calls(), 0);
        assert_eq!(handle.phase(), EnginePhase::Stopped);
        assert_eq!(handle.wait_ready().await, EnginePhase::Stopped);
        assert!(matches!(
            handle.request_profile(ProfileId::Quiet).await,
            Err(PerfSwitchError::EngineStopped)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_rediscovers_without_resubscribing() {
        let backend = ScriptedBackend::default();
        backend.push_current(Ok(ProfileId::Balanced));
        backend.push_list(Ok(ProfileCatalog::builtin()));
        let fixture = Fixture::new(backend);

        let engine = fixture.start();
        let handle = engine.handle();
        handle.wait_ready().await;
        round_trip(&handle).await;

        fixture
            .backend
            .push_list(Ok(ProfileCatalog::new([ProfileId::Balanced, ProfileId::Performance])));
        fixture.backend.push_current(Ok(ProfileId::Performance));
        let mut states = handle.watch_state();
        handle.refresh().unwrap();
        states
            .wait_for(|state| state.active_profile == Some(ProfileId::Performance))
            .await
            .unwrap();

        let state = handle.current();
        assert_eq!(state.active_profile, Some(ProfileId::Performance));
        assert_eq!(
            state.catalog.profiles(),
            &[ProfileId::Balanced, ProfileId::Performance]
        );
        assert_eq!(fixture.feed.subscribe_calls(), 1);
        engine.shutdown().await;
    }
}
