//! Side-channel notices for the presentation layer.

use crate::types::DocumentId;
use tracing::info;

/// Something the user should be told about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// Another client changed the document.
    RemoteChange { document_id: DocumentId },
}

impl Notice {
    pub fn message(&self) -> &'static str {
        match self {
            Notice::RemoteChange { .. } => "Changes were made by another user",
        }
    }
}

/// Presents notices (toasts, banners, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Notifier that emits each notice as a `tracing` event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match &notice {
            Notice::RemoteChange { document_id } => {
                info!(document_id = %document_id, "{}", notice.message());
            }
        }
    }
}
