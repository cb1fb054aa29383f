//! Startup delay and debounced resubscription.

use crate::timers::{TimerId, TimerQueue};
use std::time::{Duration, Instant};
use tracing::debug;

use super::state::ReconnectPhase;

/// Work requested when a controller timer comes due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReconnectAction {
    /// Startup delay elapsed: open the first channel.
    Open,
    /// The network stayed up for the debounce period: replace the channel.
    Resubscribe,
}

/// Decides when a session should (re)create its channel.
///
/// Pure state machine: it owns its timers but performs no I/O. The owning
/// session feeds it status transitions and polls it for due actions.
#[derive(Debug)]
pub(crate) struct ReconnectController {
    startup_delay: Duration,
    debounce: Duration,
    timers: TimerQueue<ReconnectAction>,
    startup: Option<TimerId>,
    pending_debounce: Option<TimerId>,
    phase: ReconnectPhase,
}

impl ReconnectController {
    pub(crate) fn new(startup_delay: Duration, debounce: Duration) -> Self {
        Self {
            startup_delay,
            debounce,
            timers: TimerQueue::new(),
            startup: None,
            pending_debounce: None,
            phase: ReconnectPhase::Idle,
        }
    }

    pub(crate) fn phase(&self) -> ReconnectPhase {
        self.phase
    }

    /// Arm the startup delay. Only the first call has an effect.
    pub(crate) fn activate(&mut self, now: Instant) {
        if self.phase != ReconnectPhase::Idle || self.startup.is_some() {
            return;
        }
        self.startup = Some(self.timers.schedule(now + self.startup_delay, ReconnectAction::Open));
    }

    /// Feed a reachability transition observed at `at`.
    pub(crate) fn on_status(&mut self, online: bool, at: Instant) {
        if self.phase == ReconnectPhase::Terminated {
            return;
        }
        if !online {
            // The provider reports its own failure on the open channel.
            debug!("Connection lost; keeping current channel");
            return;
        }

        if let Some(previous) = self.pending_debounce.take() {
            self.timers.cancel(previous);
        }
        self.pending_debounce = Some(
            self.timers
                .schedule(at + self.debounce, ReconnectAction::Resubscribe),
        );
        self.phase = ReconnectPhase::AwaitingDebounce;
        debug!(debounce_ms = self.debounce.as_millis() as u64, "Connection restored; debouncing");
    }

    /// Next action whose timer is due at `now`.
    pub(crate) fn pop_due(&mut self, now: Instant) -> Option<ReconnectAction> {
        if self.phase == ReconnectPhase::Terminated {
            return None;
        }
        let (id, action) = self.timers.pop_due(now)?;
        if self.startup == Some(id) {
            self.startup = None;
        }
        if self.pending_debounce == Some(id) {
            self.pending_debounce = None;
        }

        self.phase = if self.pending_debounce.is_some() {
            ReconnectPhase::AwaitingDebounce
        } else if self.startup.is_some() {
            ReconnectPhase::Idle
        } else {
            ReconnectPhase::ActiveSubscription
        };
        Some(action)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        if self.phase == ReconnectPhase::Terminated {
            return None;
        }
        self.timers.next_deadline()
    }

    /// Cancel every timer. Terminal.
    pub(crate) fn shutdown(&mut self) {
        self.timers.clear();
        self.startup = None;
        self.pending_debounce = None;
        self.phase = ReconnectPhase::Terminated;
    }
}
