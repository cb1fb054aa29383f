//! Session and reconnection state machines.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};

/// Lifecycle of a subscription session.
///
/// `Disposed` is terminal. A session never leaves it; reactivation builds a
/// new session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No live channel.
    Idle,
    /// Channel creation in progress.
    Connecting,
    /// A channel handle is held.
    Subscribed,
    /// Torn down.
    Disposed,
}

impl SessionState {
    /// Whether moving from `self` to `next` is allowed.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Idle, Disposed)
                | (Connecting, Subscribed)
                | (Connecting, Idle)
                | (Connecting, Disposed)
                | (Subscribed, Connecting)
                | (Subscribed, Disposed)
        )
    }

    /// Validated transition.
    pub fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_disposed(self) -> bool {
        self == SessionState::Disposed
    }
}

/// Phase of the reconnection controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconnectPhase {
    /// Waiting for the startup delay.
    Idle,
    /// An online transition was seen; waiting for the network to settle.
    AwaitingDebounce,
    /// A subscription has been requested and nothing is pending.
    ActiveSubscription,
    /// Shut down; no timer will fire again.
    Terminated,
}
