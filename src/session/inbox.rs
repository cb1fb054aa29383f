//! Per-session message queues.
//!
//! Provider and monitor callbacks may run on any thread. They never touch
//! session state directly; they enqueue here and the session drains the
//! queues on its own thread.
//!
//! Channel traffic goes through a bounded queue. When it is full the oldest
//! queued message is evicted so the newest state always gets through.
//! Reachability transitions use a separate unbounded queue and are never
//! dropped. Dropping the [`Inbox`] on teardown turns every late callback into
//! a no-op.

use crate::error::FeedError;
use crate::types::UpdateEvent;
use crossbeam_channel::{bounded, unbounded, Receiver, Select, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{trace, warn};

/// Channel traffic queued for a session.
#[derive(Debug)]
pub(crate) enum SessionMessage {
    /// A change delivered on channel `generation`.
    Update { generation: u64, event: UpdateEvent },
    /// A provider failure on channel `generation`.
    Error { generation: u64, error: FeedError },
}

impl SessionMessage {
    fn kind(&self) -> &'static str {
        match self {
            SessionMessage::Update { .. } => "update",
            SessionMessage::Error { .. } => "error",
        }
    }
}

/// A reachability transition observed at `at`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct StatusChange {
    pub(crate) online: bool,
    pub(crate) at: Instant,
}

struct Shared {
    closed: AtomicBool,
    overflows: AtomicU64,
}

/// Sending half of a session inbox.
#[derive(Clone)]
pub(crate) struct InboxSender {
    messages: Sender<SessionMessage>,
    /// Used to evict the oldest message when the queue is full.
    evict: Receiver<SessionMessage>,
    statuses: Sender<StatusChange>,
    shared: Arc<Shared>,
}

impl InboxSender {
    /// Enqueue without blocking, evicting the oldest message if the inbox is
    /// full. Ignored once the session is gone.
    pub(crate) fn send(&self, message: SessionMessage) {
        if self.shared.closed.load(Ordering::Acquire) {
            trace!(kind = message.kind(), "Message for closed session ignored");
            return;
        }

        let mut message = message;
        loop {
            match self.messages.try_send(message) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    message = returned;
                    if let Ok(evicted) = self.evict.try_recv() {
                        self.shared.overflows.fetch_add(1, Ordering::Relaxed);
                        warn!(kind = evicted.kind(), "Session inbox full, dropping oldest message");
                    }
                }
                Err(TrySendError::Disconnected(returned)) => {
                    trace!(kind = returned.kind(), "Message for closed session ignored");
                    return;
                }
            }
        }
    }

    /// Enqueue a reachability transition. Never dropped while the session
    /// is live.
    pub(crate) fn send_status(&self, online: bool, at: Instant) {
        if self.shared.closed.load(Ordering::Acquire) {
            trace!(online, "Status for closed session ignored");
            return;
        }
        if self.statuses.send(StatusChange { online, at }).is_err() {
            trace!(online, "Status for closed session ignored");
        }
    }

    /// Messages evicted because the inbox was full.
    pub(crate) fn overflows(&self) -> u64 {
        self.shared.overflows.load(Ordering::Relaxed)
    }
}

/// Receiving half of a session inbox, owned by the session.
pub(crate) struct Inbox {
    messages: Receiver<SessionMessage>,
    statuses: Receiver<StatusChange>,
    shared: Arc<Shared>,
}

impl Inbox {
    pub(crate) fn try_next(&self) -> Option<SessionMessage> {
        self.messages.try_recv().ok()
    }

    pub(crate) fn try_status(&self) -> Option<StatusChange> {
        self.statuses.try_recv().ok()
    }

    /// Block until either queue has something or `timeout` passes.
    ///
    /// Returns whether anything is ready. Nothing is consumed.
    pub(crate) fn ready_within(&self, timeout: Duration) -> bool {
        let mut select = Select::new();
        select.recv(&self.messages);
        select.recv(&self.statuses);
        select.ready_timeout(timeout).is_ok()
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
        while self.messages.try_recv().is_ok() {}
    }
}

/// Create an inbox holding at most `capacity` channel messages.
pub(crate) fn inbox(capacity: usize) -> (InboxSender, Inbox) {
    let (message_tx, message_rx) = bounded(capacity);
    let (status_tx, status_rx) = unbounded();
    let shared = Arc::new(Shared {
        closed: AtomicBool::new(false),
        overflows: AtomicU64::new(0),
    });

    let sender = InboxSender {
        messages: message_tx,
        evict: message_rx.clone(),
        statuses: status_tx,
        shared: Arc::clone(&shared),
    };
    let inbox = Inbox {
        messages: message_rx,
        statuses: status_rx,
        shared,
    };
    (sender, inbox)
}
