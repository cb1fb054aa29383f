//! Binding of a session's lifetime to the caller's activation signal.

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::feed::ChannelFactory;
use crate::handlers::DocumentCallbacks;
use crate::monitor::ConnectionMonitor;
use crate::notify::{Notifier, TracingNotifier};
use crate::session::{LiveSession, OpenOutcome, ReconnectPhase, SelfWriteMarker, SessionState};
use crate::types::{DocumentId, OriginTimestamp, SessionStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Services and settings shared by the sessions a binder creates.
#[derive(Clone)]
pub struct SyncContext {
    pub(crate) factory: Arc<dyn ChannelFactory>,
    pub(crate) monitor: Arc<dyn ConnectionMonitor>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) config: SyncConfig,
}

impl SyncContext {
    /// Context with the system clock, a tracing notifier and default config.
    pub fn new(factory: Arc<dyn ChannelFactory>, monitor: Arc<dyn ConnectionMonitor>) -> Self {
        Self {
            factory,
            monitor,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
            config: SyncConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the config after validating it.
    pub fn with_config(mut self, config: SyncConfig) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }
}

/// Keeps one live session in step with `{document id, enabled}`.
///
/// | document id | enabled | effect |
/// |---|---|---|
/// | absent | any | tear down the session, if any |
/// | present | false | tear down the session, if any |
/// | present | true | ensure a session for this id, replacing one for another id |
///
/// The binder is driven by [`poll`](Self::poll) (or [`wait`](Self::wait))
/// from the thread that owns it. Dropping it tears everything down.
///
/// # Example
///
/// ```ignore
/// let context = SyncContext::new(Arc::new(feed), NetworkMonitor::global());
/// let mut binder = LifecycleBinder::new(
///     context,
///     DocumentCallbacks::new().on_update(|event| refresh(event)),
/// );
///
/// binder.set_target(Some(DocumentId::from("doc1")), true);
///
/// // Before saving locally:
/// binder.mark_own_update(row_updated_at);
///
/// loop {
///     binder.wait(Duration::from_millis(250));
/// }
/// ```
pub struct LifecycleBinder {
    context: SyncContext,
    callbacks: DocumentCallbacks,
    marker: SelfWriteMarker,
    session: Option<LiveSession>,
    /// Document of the most recent session, kept after teardown.
    last_document: Option<DocumentId>,
    disposed: bool,
}

impl LifecycleBinder {
    pub fn new(context: SyncContext, callbacks: DocumentCallbacks) -> Self {
        Self {
            context,
            callbacks,
            marker: SelfWriteMarker::new(),
            session: None,
            last_document: None,
            disposed: false,
        }
    }

    /// Apply the caller's current activation signal.
    pub fn set_target(&mut self, document_id: Option<DocumentId>, enabled: bool) {
        if self.disposed {
            debug!("Binder disposed; ignoring new target");
            return;
        }

        match document_id {
            Some(id) if enabled => {
                if self.session.as_ref().is_some_and(|s| s.document_id() == &id) {
                    return;
                }
                self.teardown_session();

                if self.last_document.as_ref() != Some(&id) {
                    self.marker.clear();
                }
                self.last_document = Some(id.clone());
                self.session = Some(LiveSession::start(
                    id,
                    &self.context,
                    self.callbacks.clone(),
                    self.marker.clone(),
                ));
            }
            _ => self.teardown_session(),
        }
    }

    /// Record `timestamp` as this client's own write so its echo is dropped.
    ///
    /// Call it before (or at the moment of) the local write.
    pub fn mark_own_update(&self, timestamp: impl Into<OriginTimestamp>) {
        self.marker.mark_own_update(timestamp);
    }

    /// Shared handle to the self-write marker, for code that writes without
    /// access to the binder.
    pub fn marker(&self) -> SelfWriteMarker {
        self.marker.clone()
    }

    /// Handle queued callbacks and due timers. Never blocks.
    pub fn poll(&mut self) -> usize {
        self.session.as_mut().map_or(0, LiveSession::poll)
    }

    /// Wait up to `max_wait` for work, then poll.
    ///
    /// Returns immediately with 0 when there is no session.
    pub fn wait(&mut self, max_wait: Duration) -> usize {
        self.session
            .as_mut()
            .map_or(0, |session| session.wait(max_wait))
    }

    /// Explicit manual retry. Rate limited like every other open.
    ///
    /// `None` when there is no session.
    pub fn retry_now(&mut self) -> Option<OpenOutcome> {
        self.session.as_mut().map(LiveSession::retry)
    }

    /// Earliest pending timer deadline of the current session.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(LiveSession::next_deadline)
    }

    pub fn document_id(&self) -> Option<&DocumentId> {
        self.session.as_ref().map(LiveSession::document_id)
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(LiveSession::state)
    }

    pub fn phase(&self) -> Option<ReconnectPhase> {
        self.session.as_ref().map(LiveSession::phase)
    }

    pub fn stats(&self) -> Option<SessionStats> {
        self.session.as_ref().map(LiveSession::stats)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Tear down the session and ignore all later targets. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.teardown_session();
        self.disposed = true;
    }

    fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
        }
    }
}

impl Drop for LifecycleBinder {
    fn drop(&mut self) {
        self.dispose();
    }
}
