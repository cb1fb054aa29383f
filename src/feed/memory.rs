//! In-process change feed.

use crate::error::FeedError;
use crate::types::{FilterExpression, UpdateEvent};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::{ChannelFactory, ChannelHandle, ErrorCallback, UpdateCallback};

/// Counters describing channel churn on a [`MemoryFeed`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Channels handed out by `create`.
    pub created: u64,
    /// Channels closed through their handle.
    pub torn_down: u64,
    /// `create` calls answered with an error.
    pub rejected: u64,
    /// Highest number of simultaneously open channels.
    pub peak_live: usize,
}

/// Internal channel state.
struct Channel {
    resource: String,
    filter: FilterExpression,
    on_update: UpdateCallback,
    on_error: ErrorCallback,
}

impl Channel {
    fn matches(&self, resource: &str, event: &UpdateEvent) -> bool {
        self.resource == resource && event.row().is_some_and(|row| self.filter.matches(row))
    }
}

struct FeedInner {
    /// Open channels by ID.
    channels: RwLock<HashMap<u64, Channel>>,
    /// Counter for generating channel IDs.
    next_id: AtomicU64,
    stats: Mutex<FeedStats>,
    /// Errors returned by upcoming `create` calls, oldest first.
    scripted_failures: Mutex<VecDeque<FeedError>>,
}

/// Change feed that lives in this process.
///
/// Cloning yields another handle to the same feed. Callbacks are always
/// invoked outside the channel registry lock, so a callback may publish or
/// tear down channels itself.
#[derive(Clone)]
pub struct MemoryFeed {
    inner: Arc<FeedInner>,
}

impl MemoryFeed {
    /// Create an empty feed.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FeedInner {
                channels: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                stats: Mutex::new(FeedStats::default()),
                scripted_failures: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Number of channels currently open.
    pub fn live_channels(&self) -> usize {
        self.inner.channels.read().len()
    }

    /// Snapshot of the channel counters.
    pub fn stats(&self) -> FeedStats {
        *self.inner.stats.lock()
    }

    /// Filters of the open channels on `resource`.
    pub fn filters(&self, resource: &str) -> Vec<FilterExpression> {
        self.inner
            .channels
            .read()
            .values()
            .filter(|c| c.resource == resource)
            .map(|c| c.filter.clone())
            .collect()
    }

    /// Make the next `create` call fail with `error`.
    pub fn fail_next_create(&self, error: FeedError) {
        self.inner.scripted_failures.lock().push_back(error);
    }

    /// Deliver a change to every channel whose filter matches the changed row.
    ///
    /// Returns the number of channels the event was delivered to.
    pub fn publish(&self, resource: &str, event: UpdateEvent) -> usize {
        let targets: Vec<UpdateCallback> = {
            let channels = self.inner.channels.read();
            channels
                .values()
                .filter(|c| c.matches(resource, &event))
                .map(|c| Arc::clone(&c.on_update))
                .collect()
        };

        for on_update in &targets {
            on_update(event.clone());
        }
        targets.len()
    }

    /// Report `error` on every open channel of `resource`.
    pub fn fail_channels(&self, resource: &str, error: FeedError) -> usize {
        let targets: Vec<ErrorCallback> = {
            let channels = self.inner.channels.read();
            channels
                .values()
                .filter(|c| c.resource == resource)
                .map(|c| Arc::clone(&c.on_error))
                .collect()
        };

        for on_error in &targets {
            on_error(error.clone());
        }
        targets.len()
    }
}

impl Default for MemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelFactory for MemoryFeed {
    fn create(
        &self,
        resource: &str,
        filter: &FilterExpression,
        on_update: UpdateCallback,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn ChannelHandle>, FeedError> {
        if let Some(error) = self.inner.scripted_failures.lock().pop_front() {
            self.inner.stats.lock().rejected += 1;
            return Err(error);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let channel = Channel {
            resource: resource.to_string(),
            filter: filter.clone(),
            on_update,
            on_error,
        };

        let live = {
            let mut channels = self.inner.channels.write();
            channels.insert(id, channel);
            channels.len()
        };

        let mut stats = self.inner.stats.lock();
        stats.created += 1;
        stats.peak_live = stats.peak_live.max(live);

        Ok(Box::new(MemoryChannel {
            id,
            feed: Arc::downgrade(&self.inner),
            closed: false,
        }))
    }
}

/// Handle to a [`MemoryFeed`] channel.
///
/// Dropping the handle without calling `teardown` leaves the channel open.
struct MemoryChannel {
    id: u64,
    feed: Weak<FeedInner>,
    closed: bool,
}

impl ChannelHandle for MemoryChannel {
    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(inner) = self.feed.upgrade() {
            if inner.channels.write().remove(&self.id).is_some() {
                inner.stats.lock().torn_down += 1;
            }
        }
    }
}
