//! Caller-supplied callbacks for a synchronized document.
//!
//! - [`on_update`](DocumentCallbacks::on_update): a change made elsewhere
//!   reached this client
//! - [`on_error`](DocumentCallbacks::on_error): the change-feed provider
//!   reported a failure on the live channel
//!
//! # Example
//!
//! ```ignore
//! let callbacks = DocumentCallbacks::new()
//!     .on_update(|event| reload_rows(event))
//!     .on_error(|error| eprintln!("Realtime error: {}", error));
//! ```

use crate::error::FeedError;
use crate::types::UpdateEvent;
use std::fmt;
use std::sync::Arc;

/// Type alias for the on_update callback.
pub type OnUpdateCallback = Arc<dyn Fn(&UpdateEvent) + Send + Sync>;

/// Type alias for the on_error callback.
pub type OnErrorCallback = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// Callbacks invoked from the session pump.
///
/// Both are optional. They run on the thread that calls
/// [`LifecycleBinder::poll`](crate::LifecycleBinder::poll).
#[derive(Clone, Default)]
pub struct DocumentCallbacks {
    pub(crate) on_update: Option<OnUpdateCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
}

impl fmt::Debug for DocumentCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentCallbacks")
            .field("on_update", &self.on_update.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

impl DocumentCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the callback for changes not made by this client.
    pub fn on_update(mut self, f: impl Fn(&UpdateEvent) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    /// Register the callback for provider errors on the live channel.
    pub fn on_error(mut self, f: impl Fn(&FeedError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_update(&self, event: &UpdateEvent) {
        if let Some(cb) = &self.on_update {
            cb(event);
        }
    }

    pub(crate) fn emit_error(&self, error: &FeedError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }
}
