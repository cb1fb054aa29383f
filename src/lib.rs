//! # Runsheet Sync
//!
//! Keeps a client's view of a shared, remotely stored runsheet consistent
//! with edits made by other clients or tabs, over a change feed that can
//! drop and come back.
//!
//! ## Core Concepts
//!
//! - **Channel**: a live change-feed subscription for one document, opened
//!   through a [`ChannelFactory`] and owned by exactly one session
//! - **Session**: the channel plus its startup delay, rate limit, and
//!   debounced reconnection, created per activated document
//! - **Echo filter**: drops changes that merely reflect this client's own
//!   write, identified by the timestamp passed to `mark_own_update`
//! - **Binder**: maps `{document id, enabled}` onto session lifetimes
//!
//! ## Example
//!
//! ```ignore
//! use runsheet_sync::{DocumentCallbacks, DocumentId, LifecycleBinder, MemoryFeed,
//!     NetworkMonitor, SyncContext};
//!
//! let feed = MemoryFeed::new();
//! let monitor = NetworkMonitor::global();
//! let context = SyncContext::new(Arc::new(feed.clone()), monitor);
//!
//! let mut binder = LifecycleBinder::new(
//!     context,
//!     DocumentCallbacks::new().on_update(|event| println!("Remote change: {:?}", event)),
//! );
//! binder.set_target(Some(DocumentId::from("doc1")), true);
//!
//! // Drive the session from the owning thread
//! binder.wait(Duration::from_millis(100));
//! ```

pub mod binder;
pub mod clock;
pub mod config;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod monitor;
pub mod notify;
pub mod session;
pub mod timers;
pub mod types;

// Re-exports
pub use binder::{LifecycleBinder, SyncContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use error::{FeedError, Result, SyncError};
pub use feed::{ChannelFactory, ChannelHandle, ErrorCallback, FeedStats, MemoryFeed, UpdateCallback};
pub use handlers::{DocumentCallbacks, OnErrorCallback, OnUpdateCallback};
pub use monitor::{ConnectionMonitor, ListenerId, NetworkMonitor, StatusListener};
pub use notify::{Notice, Notifier, TracingNotifier};
pub use session::{Delivery, EchoFilter, OpenOutcome, ReconnectPhase, SelfWriteMarker, SessionState};
pub use timers::{TimerId, TimerQueue};
pub use types::*;
