//! Synchronization configuration.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by every session a binder creates.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Resource (table) whose rows are subscribed to.
    /// Default: "runsheets"
    pub resource: String,

    /// Column the document id is matched against.
    /// Default: "id"
    pub filter_column: String,

    /// Delay between activation and the first channel creation.
    /// Default: 500ms
    pub startup_delay_ms: u64,

    /// Minimum spacing between two channel-creation attempts of one session.
    /// Default: 2000ms
    pub min_subscribe_interval_ms: u64,

    /// Quiet period after coming back online before resubscribing.
    /// Default: 2000ms
    pub reconnect_debounce_ms: u64,

    /// Max queued provider/monitor messages per session.
    /// Default: 256
    pub inbox_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            resource: "runsheets".to_string(),
            filter_column: "id".to_string(),
            startup_delay_ms: 500,
            min_subscribe_interval_ms: 2000,
            reconnect_debounce_ms: 2000,
            inbox_capacity: 256,
        }
    }
}

impl SyncConfig {
    /// Parse a JSON config, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource.trim().is_empty() {
            return Err(SyncError::InvalidConfig("resource must not be empty".to_string()));
        }
        if self.filter_column.trim().is_empty() {
            return Err(SyncError::InvalidConfig(
                "filter_column must not be empty".to_string(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "inbox_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }

    pub fn min_subscribe_interval(&self) -> Duration {
        Duration::from_millis(self.min_subscribe_interval_ms)
    }

    pub fn reconnect_debounce(&self) -> Duration {
        Duration::from_millis(self.reconnect_debounce_ms)
    }
}
