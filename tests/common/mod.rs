//! Shared fixtures for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use runsheet_sync::{
    ChannelFactory, ChannelHandle, ConnectionMonitor, DocumentCallbacks, DocumentId,
    ErrorCallback, FeedError, FilterExpression, LifecycleBinder, ListenerId, ManualClock,
    MemoryFeed, NetworkMonitor, Notice, Notifier, StatusListener, SyncConfig, SyncContext,
    UpdateCallback, UpdateEvent,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

pub const RESOURCE: &str = "runsheets";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

pub fn doc(id: &str) -> Option<DocumentId> {
    Some(DocumentId::from(id))
}

/// Notifier that keeps every notice.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// Everything a binder needs, with virtual time and recording callbacks.
pub struct Harness {
    pub feed: MemoryFeed,
    pub monitor: Arc<NetworkMonitor>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub updates: Arc<Mutex<Vec<UpdateEvent>>>,
    pub errors: Arc<Mutex<Vec<FeedError>>>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::default())
    }

    pub fn with_config(config: SyncConfig) -> Self {
        init_tracing();
        Self {
            feed: MemoryFeed::new(),
            monitor: Arc::new(NetworkMonitor::new(true)),
            clock: Arc::new(ManualClock::new()),
            notifier: Arc::new(RecordingNotifier::default()),
            updates: Arc::new(Mutex::new(Vec::new())),
            errors: Arc::new(Mutex::new(Vec::new())),
            config,
        }
    }

    pub fn context_with(&self, factory: Arc<dyn ChannelFactory>) -> SyncContext {
        self.context_with_monitor(factory, self.monitor.clone())
    }

    pub fn context_with_monitor(
        &self,
        factory: Arc<dyn ChannelFactory>,
        monitor: Arc<dyn ConnectionMonitor>,
    ) -> SyncContext {
        SyncContext::new(factory, monitor)
            .with_clock(self.clock.clone())
            .with_notifier(self.notifier.clone())
            .with_config(self.config.clone())
            .unwrap()
    }

    pub fn callbacks(&self) -> DocumentCallbacks {
        let updates = Arc::clone(&self.updates);
        let errors = Arc::clone(&self.errors);
        DocumentCallbacks::new()
            .on_update(move |event| updates.lock().push(event.clone()))
            .on_error(move |error| errors.lock().push(error.clone()))
    }

    pub fn binder(&self) -> LifecycleBinder {
        self.binder_with(Arc::new(self.feed.clone()))
    }

    pub fn binder_with(&self, factory: Arc<dyn ChannelFactory>) -> LifecycleBinder {
        LifecycleBinder::new(self.context_with(factory), self.callbacks())
    }

    /// Move virtual time to `ms` after the harness was created, then poll.
    pub fn at(&self, binder: &mut LifecycleBinder, ms: u64) -> usize {
        self.clock.set_elapsed(Duration::from_millis(ms));
        binder.poll()
    }

    /// Flip the network at `ms`, then poll.
    pub fn network_at(&self, binder: &mut LifecycleBinder, ms: u64, online: bool) {
        self.clock.set_elapsed(Duration::from_millis(ms));
        self.monitor.set_online(online);
        binder.poll();
    }

    /// Publish an UPDATE of `doc_id` written at `origin`.
    pub fn remote_update(&self, doc_id: &str, origin: &str) -> usize {
        self.feed.publish(
            RESOURCE,
            UpdateEvent::update(
                json!({"id": doc_id}),
                json!({"id": doc_id, "updated_at": origin}),
            ),
        )
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn notice_count(&self) -> usize {
        self.notifier.notices.lock().len()
    }
}

/// Shared log of collaborator calls, in order.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Factory wrapper that logs create/teardown calls.
pub struct JournalingFactory {
    pub inner: MemoryFeed,
    pub journal: Journal,
}

struct JournalingHandle {
    inner: Box<dyn ChannelHandle>,
    journal: Journal,
}

impl ChannelHandle for JournalingHandle {
    fn teardown(&mut self) {
        self.journal.lock().push("teardown".to_string());
        self.inner.teardown();
    }
}

impl ChannelFactory for JournalingFactory {
    fn create(
        &self,
        resource: &str,
        filter: &FilterExpression,
        on_update: UpdateCallback,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn ChannelHandle>, FeedError> {
        self.journal.lock().push(format!("create {}", filter));
        let inner = self.inner.create(resource, filter, on_update, on_error)?;
        Ok(Box::new(JournalingHandle {
            inner,
            journal: Arc::clone(&self.journal),
        }))
    }
}

/// Monitor wrapper that logs listener registration.
pub struct JournalingMonitor {
    pub inner: Arc<NetworkMonitor>,
    pub journal: Journal,
}

impl ConnectionMonitor for JournalingMonitor {
    fn is_online(&self) -> bool {
        self.inner.is_online()
    }

    fn on_status_change(&self, listener: StatusListener) -> ListenerId {
        self.journal.lock().push("add_listener".to_string());
        self.inner.on_status_change(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.journal.lock().push("remove_listener".to_string());
        self.inner.remove_listener(id)
    }
}

/// Factory that keeps every callback pair it was ever given, so tests can
/// play a provider that keeps calling after teardown.
#[derive(Default)]
pub struct CapturingFactory {
    pub channels: Mutex<Vec<(UpdateCallback, ErrorCallback)>>,
}

struct NoopHandle;

impl ChannelHandle for NoopHandle {
    fn teardown(&mut self) {}
}

impl CapturingFactory {
    pub fn created(&self) -> usize {
        self.channels.lock().len()
    }

    /// Invoke the update callback of the `index`-th created channel.
    pub fn deliver(&self, index: usize, event: UpdateEvent) {
        let on_update = Arc::clone(&self.channels.lock()[index].0);
        on_update(event);
    }

    /// Invoke the error callback of the `index`-th created channel.
    pub fn fail(&self, index: usize, error: FeedError) {
        let on_error = Arc::clone(&self.channels.lock()[index].1);
        on_error(error);
    }
}

impl ChannelFactory for CapturingFactory {
    fn create(
        &self,
        _resource: &str,
        _filter: &FilterExpression,
        on_update: UpdateCallback,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn ChannelHandle>, FeedError> {
        self.channels.lock().push((on_update, on_error));
        Ok(Box::new(NoopHandle))
    }
}
