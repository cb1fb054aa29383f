//! Live synchronization of one document.
//!
//! A session combines:
//! - a [`SubscriptionSession`] owning the change-feed channel
//! - a [`ReconnectController`] scheduling the first open and debounced
//!   reopens after the network comes back
//! - an [`EchoFilter`] dropping changes that reflect this client's own write
//!
//! All of it is driven from one thread. Provider and monitor callbacks only
//! enqueue messages; [`LiveSession::poll`] drains them in order and fires
//! due timers.

mod echo;
mod inbox;
mod reconnect;
mod state;
mod subscription;

pub use echo::{Delivery, EchoFilter, SelfWriteMarker};
pub use state::{ReconnectPhase, SessionState};
pub use subscription::OpenOutcome;

use crate::binder::SyncContext;
use crate::clock::Clock;
use crate::handlers::DocumentCallbacks;
use crate::monitor::{ConnectionMonitor, ListenerId};
use crate::notify::{Notice, Notifier};
use crate::types::{DocumentId, FilterExpression, SessionStats};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use inbox::{Inbox, InboxSender, SessionMessage, StatusChange};
use reconnect::{ReconnectAction, ReconnectController};
use subscription::SubscriptionSession;

pub(crate) struct LiveSession {
    document_id: DocumentId,
    subscription: SubscriptionSession,
    reconnect: ReconnectController,
    echo: EchoFilter,
    /// `None` once torn down.
    inbox: Option<Inbox>,
    inbox_tx: InboxSender,
    listener: Option<ListenerId>,
    monitor: Arc<dyn ConnectionMonitor>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    callbacks: DocumentCallbacks,
    stats: SessionStats,
}

impl LiveSession {
    /// Register with the monitor and arm the startup delay.
    pub(crate) fn start(
        document_id: DocumentId,
        context: &SyncContext,
        callbacks: DocumentCallbacks,
        marker: SelfWriteMarker,
    ) -> Self {
        let config = &context.config;
        let (inbox_tx, inbox_rx) = inbox::inbox(config.inbox_capacity);

        let subscription = SubscriptionSession::new(
            document_id.clone(),
            config.resource.clone(),
            FilterExpression::eq(config.filter_column.clone(), document_id.as_str()),
            Arc::clone(&context.factory),
            inbox_tx.clone(),
            config.min_subscribe_interval(),
        );

        let status_tx = inbox_tx.clone();
        let status_clock = Arc::clone(&context.clock);
        let listener = context.monitor.on_status_change(Arc::new(move |online: bool| {
            status_tx.send_status(online, status_clock.now())
        }));

        let mut reconnect =
            ReconnectController::new(config.startup_delay(), config.reconnect_debounce());
        reconnect.activate(context.clock.now());

        info!(document_id = %document_id, "Session started");

        Self {
            document_id,
            subscription,
            reconnect,
            echo: EchoFilter::new(marker),
            inbox: Some(inbox_rx),
            inbox_tx,
            listener: Some(listener),
            monitor: Arc::clone(&context.monitor),
            clock: Arc::clone(&context.clock),
            notifier: Arc::clone(&context.notifier),
            callbacks,
            stats: SessionStats::default(),
        }
    }

    pub(crate) fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub(crate) fn state(&self) -> SessionState {
        self.subscription.state()
    }

    pub(crate) fn phase(&self) -> ReconnectPhase {
        self.reconnect.phase()
    }

    pub(crate) fn stats(&self) -> SessionStats {
        SessionStats {
            inbox_overflows: self.inbox_tx.overflows(),
            ..self.stats
        }
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.reconnect.next_deadline()
    }

    /// Handle queued messages and due timers until neither is left.
    ///
    /// Returns the number of messages and timers handled.
    pub(crate) fn poll(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let mut progressed = false;

            while let Some(change) = self.next_status() {
                self.handle_status(change);
                handled += 1;
                progressed = true;
            }

            while let Some(message) = self.next_message() {
                self.handle_message(message);
                handled += 1;
                progressed = true;
            }

            let now = self.clock.now();
            while let Some(action) = self.reconnect.pop_due(now) {
                self.run_action(action, now);
                handled += 1;
                progressed = true;
            }

            if !progressed {
                return handled;
            }
        }
    }

    /// Block until a message arrives, the next timer is due, or `max_wait`
    /// passes; then poll.
    pub(crate) fn wait(&mut self, max_wait: Duration) -> usize {
        let timeout = match self.reconnect.next_deadline() {
            Some(deadline) => deadline
                .saturating_duration_since(self.clock.now())
                .min(max_wait),
            None => max_wait,
        };

        if let Some(inbox) = &self.inbox {
            inbox.ready_within(timeout);
        }
        self.poll()
    }

    /// Caller-initiated reopen, subject to the same rate limit.
    pub(crate) fn retry(&mut self) -> OpenOutcome {
        let outcome = self.subscription.open(self.clock.now());
        self.record(&outcome);
        outcome
    }

    /// Cancel timers, unregister the status listener, tear down the channel
    /// and close the inbox, in that order. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if self.inbox.is_none() {
            return;
        }
        self.reconnect.shutdown();
        if let Some(listener) = self.listener.take() {
            self.monitor.remove_listener(listener);
        }
        self.subscription.close();
        self.inbox = None;

        info!(document_id = %self.document_id, "Session stopped");
    }

    fn next_message(&self) -> Option<SessionMessage> {
        self.inbox.as_ref()?.try_next()
    }

    fn next_status(&self) -> Option<StatusChange> {
        self.inbox.as_ref()?.try_status()
    }

    fn handle_status(&mut self, change: StatusChange) {
        trace!(document_id = %self.document_id, online = change.online, "Connection status observed");
        self.reconnect.on_status(change.online, change.at);
    }

    fn handle_message(&mut self, message: SessionMessage) {
        if self.subscription.state().is_disposed() {
            self.stats.stale_messages += 1;
            return;
        }

        match message {
            SessionMessage::Update { generation, event } => {
                if !self.subscription.is_current(generation) {
                    self.stats.stale_messages += 1;
                    trace!(document_id = %self.document_id, generation, "Dropped update from old channel");
                    return;
                }
                match self.echo.classify(&event) {
                    Delivery::Suppressed => {
                        self.stats.echoes_suppressed += 1;
                        debug!(
                            document_id = %self.document_id,
                            origin = ?event.origin_timestamp,
                            "Suppressed echo of own write"
                        );
                    }
                    Delivery::Forward { notify } => {
                        self.stats.events_forwarded += 1;
                        self.callbacks.emit_update(&event);
                        if notify {
                            self.notifier.notify(Notice::RemoteChange {
                                document_id: self.document_id.clone(),
                            });
                        }
                    }
                }
            }
            SessionMessage::Error { generation, error } => {
                if !self.subscription.is_current(generation) {
                    self.stats.stale_messages += 1;
                    trace!(document_id = %self.document_id, generation, "Dropped error from old channel");
                    return;
                }
                warn!(document_id = %self.document_id, error = %error, "Channel error");
                self.stats.errors_forwarded += 1;
                self.callbacks.emit_error(&error);
            }
        }
    }

    fn run_action(&mut self, action: ReconnectAction, now: Instant) {
        let outcome = match action {
            ReconnectAction::Open => self.subscription.open(now),
            ReconnectAction::Resubscribe => {
                if !self.monitor.is_online() {
                    debug!(document_id = %self.document_id, "Still offline; skipping resubscribe");
                    return;
                }
                self.stats.resubscribes += 1;
                self.subscription.request_resubscribe(now)
            }
        };
        self.record(&outcome);
    }

    fn record(&mut self, outcome: &OpenOutcome) {
        match outcome {
            OpenOutcome::Opened { .. } => self.stats.channels_opened += 1,
            OpenOutcome::RateLimited => self.stats.rate_limited += 1,
            OpenOutcome::Failed(_) => self.stats.open_failures += 1,
            OpenOutcome::InProgress | OpenOutcome::Disposed => {}
        }
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
