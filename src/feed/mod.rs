//! Change-feed provider interface.
//!
//! A [`ChannelFactory`] opens a live subscription to row-level changes of one
//! resource, filtered to a single document, and reports changes and failures
//! through two callbacks. The returned [`ChannelHandle`] is the only way to
//! stop the subscription.
//!
//! [`MemoryFeed`] is an in-process factory that broadcasts published changes
//! to matching channels.
//!
//! # Example
//!
//! ```ignore
//! let feed = MemoryFeed::new();
//! let on_update: UpdateCallback = Arc::new(|event| println!("{:?}", event));
//! let on_error: ErrorCallback = Arc::new(|error| eprintln!("{}", error));
//!
//! let mut handle = feed.create(
//!     "runsheets",
//!     &FilterExpression::eq("id", "doc1"),
//!     on_update,
//!     on_error,
//! )?;
//!
//! feed.publish("runsheets", UpdateEvent::insert(json!({"id": "doc1"})));
//! handle.teardown();
//! ```

mod memory;

use crate::error::FeedError;
use crate::types::{FilterExpression, UpdateEvent};
use std::sync::Arc;

pub use memory::{FeedStats, MemoryFeed};

/// Callback receiving each change delivered on a channel.
pub type UpdateCallback = Arc<dyn Fn(UpdateEvent) + Send + Sync>;

/// Callback receiving provider-side channel failures.
pub type ErrorCallback = Arc<dyn Fn(FeedError) + Send + Sync>;

/// Opens live change-feed channels.
pub trait ChannelFactory: Send + Sync {
    /// Open a channel on `resource` restricted to rows matching `filter`.
    ///
    /// Failures may be reported either by returning `Err` or, after the
    /// handle has been returned, through `on_error`.
    fn create(
        &self,
        resource: &str,
        filter: &FilterExpression,
        on_update: UpdateCallback,
        on_error: ErrorCallback,
    ) -> Result<Box<dyn ChannelHandle>, FeedError>;
}

/// Ownership token for one open channel.
pub trait ChannelHandle: Send {
    /// Stop delivery. Calling it more than once has no further effect.
    fn teardown(&mut self);
}
