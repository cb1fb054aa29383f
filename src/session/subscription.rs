//! Channel ownership for one document.

use crate::error::FeedError;
use crate::feed::{ChannelFactory, ChannelHandle, ErrorCallback, UpdateCallback};
use crate::types::{DocumentId, FilterExpression, UpdateEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use super::inbox::{InboxSender, SessionMessage};
use super::state::SessionState;

/// Result of a channel-creation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new channel was created; older channels were torn down first.
    Opened { generation: u64 },
    /// Dropped: the previous attempt was too recent.
    RateLimited,
    /// Dropped: another creation is still running.
    InProgress,
    /// The factory refused the channel. Not retried.
    Failed(FeedError),
    /// The session has been torn down.
    Disposed,
}

/// Enforces a minimum spacing between creation attempts.
#[derive(Debug)]
struct RateLimiter {
    min_interval: Duration,
    last_attempt: Option<Instant>,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_attempt: None,
        }
    }

    /// Claim an attempt at `now`. False if the last one began too recently.
    fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt {
            if now.saturating_duration_since(last) < self.min_interval {
                return false;
            }
        }
        self.last_attempt = Some(now);
        true
    }
}

struct LiveChannel {
    generation: u64,
    handle: Box<dyn ChannelHandle>,
}

/// Owns at most one live channel for a document.
///
/// Every channel is tagged with a generation. Callbacks of a channel enqueue
/// their generation with each message so the session can discard traffic
/// from channels it has already replaced.
pub(crate) struct SubscriptionSession {
    document_id: DocumentId,
    resource: String,
    filter: FilterExpression,
    factory: Arc<dyn ChannelFactory>,
    inbox: InboxSender,
    state: SessionState,
    channel: Option<LiveChannel>,
    limiter: RateLimiter,
    generation: u64,
}

impl SubscriptionSession {
    pub(crate) fn new(
        document_id: DocumentId,
        resource: String,
        filter: FilterExpression,
        factory: Arc<dyn ChannelFactory>,
        inbox: InboxSender,
        min_interval: Duration,
    ) -> Self {
        Self {
            document_id,
            resource,
            filter,
            factory,
            inbox,
            state: SessionState::Idle,
            channel: None,
            limiter: RateLimiter::new(min_interval),
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    /// Whether messages tagged with `generation` come from the live channel.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        !self.state.is_disposed()
            && self
                .channel
                .as_ref()
                .is_some_and(|channel| channel.generation == generation)
    }

    #[cfg(test)]
    fn has_channel(&self) -> bool {
        self.channel.is_some()
    }

    /// Replace the current channel with a fresh one, subject to rate limiting.
    pub(crate) fn open(&mut self, now: Instant) -> OpenOutcome {
        match self.state {
            SessionState::Disposed => {
                trace!(document_id = %self.document_id, "Open on disposed session ignored");
                return OpenOutcome::Disposed;
            }
            SessionState::Connecting => {
                debug!(document_id = %self.document_id, "Channel creation already in progress");
                return OpenOutcome::InProgress;
            }
            SessionState::Idle | SessionState::Subscribed => {}
        }

        if !self.limiter.try_acquire(now) {
            debug!(document_id = %self.document_id, "Subscription attempt rate limited");
            return OpenOutcome::RateLimited;
        }

        self.set_state(SessionState::Connecting);
        self.teardown_channel();

        self.generation += 1;
        let generation = self.generation;
        let (on_update, on_error) = self.callbacks(generation);

        match self
            .factory
            .create(&self.resource, &self.filter, on_update, on_error)
        {
            Ok(handle) => {
                self.channel = Some(LiveChannel { generation, handle });
                self.set_state(SessionState::Subscribed);
                info!(
                    document_id = %self.document_id,
                    filter = %self.filter,
                    generation,
                    "Channel opened"
                );
                OpenOutcome::Opened { generation }
            }
            Err(error) => {
                self.set_state(SessionState::Idle);
                warn!(
                    document_id = %self.document_id,
                    error = %error,
                    "Channel creation failed; waiting for next trigger"
                );
                OpenOutcome::Failed(error)
            }
        }
    }

    /// Reopen after a reconnection. Same rules as [`open`](Self::open).
    pub(crate) fn request_resubscribe(&mut self, now: Instant) -> OpenOutcome {
        debug!(document_id = %self.document_id, "Resubscribe requested");
        self.open(now)
    }

    /// Tear down the channel and dispose the session. Idempotent.
    pub(crate) fn close(&mut self) {
        if self.state.is_disposed() {
            return;
        }
        self.teardown_channel();
        self.set_state(SessionState::Disposed);
    }

    fn callbacks(&self, generation: u64) -> (UpdateCallback, ErrorCallback) {
        let updates = self.inbox.clone();
        let errors = self.inbox.clone();
        let on_update: UpdateCallback =
            Arc::new(move |event: UpdateEvent| updates.send(SessionMessage::Update { generation, event }));
        let on_error: ErrorCallback =
            Arc::new(move |error: FeedError| errors.send(SessionMessage::Error { generation, error }));
        (on_update, on_error)
    }

    fn teardown_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.handle.teardown();
            debug!(
                document_id = %self.document_id,
                generation = channel.generation,
                "Channel torn down"
            );
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if let Err(e) = self.state.transition(next) {
            warn!(document_id = %self.document_id, error = %e, "Rejected session transition");
        }
    }
}

impl Drop for SubscriptionSession {
    fn drop(&mut self) {
        self.close();
    }
}
