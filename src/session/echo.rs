//! Suppression of this client's own writes echoed back by the feed.

use crate::types::{ChangeKind, OriginTimestamp, UpdateEvent};
use parking_lot::Mutex;
use std::sync::Arc;

/// Timestamp of the last write this client made to the document.
///
/// Cloning shares the same cell. The caller sets it right before (or at the
/// moment of) a local write; the echo filter only reads it.
#[derive(Clone, Debug, Default)]
pub struct SelfWriteMarker {
    last: Arc<Mutex<Option<OriginTimestamp>>>,
}

impl SelfWriteMarker {
    /// Create an unset marker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `timestamp` as written by this client.
    pub fn mark_own_update(&self, timestamp: impl Into<OriginTimestamp>) {
        *self.last.lock() = Some(timestamp.into());
    }

    /// The last marked timestamp, if any.
    pub fn current(&self) -> Option<OriginTimestamp> {
        self.last.lock().clone()
    }

    /// Forget the marked timestamp.
    pub fn clear(&self) {
        *self.last.lock() = None;
    }
}

/// What to do with an incoming update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// Own write; drop it.
    Suppressed,
    /// Hand it to the caller, and raise a notice when `notify` is set.
    Forward { notify: bool },
}

/// Decides whether an update reflects this client's own write.
#[derive(Clone, Debug)]
pub struct EchoFilter {
    marker: SelfWriteMarker,
}

impl EchoFilter {
    /// Create a filter reading `marker`.
    pub fn new(marker: SelfWriteMarker) -> Self {
        Self { marker }
    }

    /// True when the event's origin equals the last marked own write.
    pub fn should_suppress(&self, event: &UpdateEvent) -> bool {
        match (&event.origin_timestamp, self.marker.last.lock().as_ref()) {
            (Some(origin), Some(own)) => origin == own,
            _ => false,
        }
    }

    pub fn classify(&self, event: &UpdateEvent) -> Delivery {
        if self.should_suppress(event) {
            Delivery::Suppressed
        } else {
            Delivery::Forward {
                notify: event.kind == ChangeKind::Update,
            }
        }
    }
}
