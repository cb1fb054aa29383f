//! Network reachability monitoring.
//!
//! The [`ConnectionMonitor`] is a process-wide service: one reachability
//! status, many listeners. Each session registers its own listener and must
//! remove it on teardown.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Listener invoked with the new status (`true` = online) on every change.
pub type StatusListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Identifier of a registered status listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Observer of network reachability.
pub trait ConnectionMonitor: Send + Sync {
    /// Current status.
    fn is_online(&self) -> bool;

    /// Register a listener for status transitions.
    fn on_status_change(&self, listener: StatusListener) -> ListenerId;

    /// Remove a listener. Returns false if it was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// In-process [`ConnectionMonitor`] fed by the host's reachability probe.
pub struct NetworkMonitor {
    online: AtomicBool,
    listeners: RwLock<HashMap<ListenerId, StatusListener>>,
    next_id: AtomicU64,
}

impl NetworkMonitor {
    /// Create a monitor with the given initial status.
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// The process-wide monitor, initially online.
    pub fn global() -> Arc<NetworkMonitor> {
        static GLOBAL: OnceLock<Arc<NetworkMonitor>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(NetworkMonitor::new(true))))
    }

    /// Record a new status. Listeners run only when the status changes.
    pub fn set_online(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }

        let listeners: Vec<StatusListener> = self.listeners.read().values().cloned().collect();
        debug!(online, listeners = listeners.len(), "Connection status changed");

        for listener in listeners {
            listener(online);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl ConnectionMonitor for NetworkMonitor {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn on_status_change(&self, listener: StatusListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.listeners.write().insert(id, listener);
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.write().remove(&id).is_some()
    }
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_listeners_see_transitions_only() {
        let monitor = NetworkMonitor::new(true);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        monitor.on_status_change(Arc::new(move |online: bool| sink.lock().push(online)));

        monitor.set_online(true);
        monitor.set_online(false);
        monitor.set_online(false);
        monitor.set_online(true);

        assert_eq!(*seen.lock(), vec![false, true]);
        assert!(monitor.is_online());
    }

    #[test]
    fn test_remove_listener() {
        let monitor = NetworkMonitor::new(true);
        let seen = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&seen);
        let id = monitor.on_status_change(Arc::new(move |_: bool| *sink.lock() += 1));
        assert_eq!(monitor.listener_count(), 1);

        assert!(monitor.remove_listener(id));
        assert!(!monitor.remove_listener(id));
        monitor.set_online(false);

        assert_eq!(*seen.lock(), 0);
        assert_eq!(monitor.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_unregister_itself() {
        let monitor = Arc::new(NetworkMonitor::new(true));
        let slot: Arc<Mutex<Option<ListenerId>>> = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&monitor);
        let own_id = Arc::clone(&slot);
        let id = monitor.on_status_change(Arc::new(move |_: bool| {
            if let (Some(monitor), Some(id)) = (weak.upgrade(), *own_id.lock()) {
                monitor.remove_listener(id);
            }
        }));
        *slot.lock() = Some(id);

        monitor.set_online(false);
        assert_eq!(monitor.listener_count(), 0);
    }
}
