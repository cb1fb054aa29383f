//! Core types for document synchronization.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Row field carrying the write timestamp used for echo detection.
pub const ORIGIN_FIELD: &str = "updated_at";

/// Identifier of a shared document (one runsheet row).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Create a document id.
    pub fn new(id: impl Into<String>) -> Self {
        DocumentId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId(s.to_string())
    }
}

/// Timestamp attached to a write, compared by equality only.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginTimestamp(pub String);

impl OriginTimestamp {
    pub fn new(ts: impl Into<String>) -> Self {
        OriginTimestamp(ts.into())
    }
}

impl fmt::Debug for OriginTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.0)
    }
}

impl fmt::Display for OriginTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OriginTimestamp {
    fn from(s: &str) -> Self {
        OriginTimestamp(s.to_string())
    }
}

impl From<String> for OriginTimestamp {
    fn from(s: String) -> Self {
        OriginTimestamp(s)
    }
}

/// Kind of row-level change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Insert => write!(f, "INSERT"),
            ChangeKind::Update => write!(f, "UPDATE"),
            ChangeKind::Delete => write!(f, "DELETE"),
        }
    }
}

/// A row-level change delivered by the change feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub kind: ChangeKind,
    /// Row before the change (UPDATE, DELETE).
    pub previous_state: Option<Value>,
    /// Row after the change (INSERT, UPDATE).
    pub new_state: Option<Value>,
    /// Timestamp of the write that produced this change, if known.
    pub origin_timestamp: Option<OriginTimestamp>,
}

impl UpdateEvent {
    /// Build an event, taking the origin timestamp from the new row.
    pub fn from_rows(
        kind: ChangeKind,
        previous_state: Option<Value>,
        new_state: Option<Value>,
    ) -> Self {
        let origin_timestamp = new_state.as_ref().and_then(origin_of);
        Self {
            kind,
            previous_state,
            new_state,
            origin_timestamp,
        }
    }

    pub fn insert(new_state: Value) -> Self {
        Self::from_rows(ChangeKind::Insert, None, Some(new_state))
    }

    pub fn update(previous_state: Value, new_state: Value) -> Self {
        Self::from_rows(ChangeKind::Update, Some(previous_state), Some(new_state))
    }

    pub fn delete(previous_state: Value) -> Self {
        Self::from_rows(ChangeKind::Delete, Some(previous_state), None)
    }

    /// Override the origin timestamp.
    pub fn with_origin(mut self, origin: impl Into<OriginTimestamp>) -> Self {
        self.origin_timestamp = Some(origin.into());
        self
    }

    /// Clear the origin timestamp.
    pub fn without_origin(mut self) -> Self {
        self.origin_timestamp = None;
        self
    }

    /// The row this event describes: the new row if present, else the old one.
    pub fn row(&self) -> Option<&Value> {
        self.new_state.as_ref().or(self.previous_state.as_ref())
    }
}

fn origin_of(row: &Value) -> Option<OriginTimestamp> {
    match row.get(ORIGIN_FIELD)? {
        Value::String(s) => Some(OriginTimestamp(s.clone())),
        Value::Number(n) => Some(OriginTimestamp(n.to_string())),
        _ => None,
    }
}

/// Row-change message as published by the change-feed provider.
///
/// Provider implementations decode incoming frames with this type and hand
/// the resulting [`UpdateEvent`] to the update callback.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RowChangePayload {
    #[serde(rename = "eventType")]
    pub event_type: ChangeKind,
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default)]
    pub new: Option<Value>,
}

impl RowChangePayload {
    /// Decode a JSON payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let payload: RowChangePayload = serde_json::from_str(json)?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        // Providers send `{}` rather than null for an absent side.
        let present = |v: &Option<Value>| matches!(v, Some(Value::Object(m)) if !m.is_empty());
        match self.event_type {
            ChangeKind::Insert if !present(&self.new) => Err(SyncError::InvalidPayload(
                "INSERT without new row".to_string(),
            )),
            ChangeKind::Update if !present(&self.new) => Err(SyncError::InvalidPayload(
                "UPDATE without new row".to_string(),
            )),
            ChangeKind::Delete if !present(&self.old) => Err(SyncError::InvalidPayload(
                "DELETE without old row".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl From<RowChangePayload> for UpdateEvent {
    fn from(payload: RowChangePayload) -> Self {
        let non_empty = |v: Option<Value>| v.filter(|v| !matches!(v, Value::Object(m) if m.is_empty()));
        UpdateEvent::from_rows(payload.event_type, non_empty(payload.old), non_empty(payload.new))
    }
}

/// Equality filter on one column of the subscribed resource.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterExpression {
    pub column: String,
    pub value: String,
}

impl FilterExpression {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Check whether a row satisfies this filter.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => *s == self.value,
            Some(Value::Number(n)) => n.to_string() == self.value,
            _ => false,
        }
    }
}

impl fmt::Debug for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self)
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// Per-session counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Channels successfully created.
    pub channels_opened: u64,
    /// Channel creations the factory rejected.
    pub open_failures: u64,
    /// Open requests dropped by the rate limiter.
    pub rate_limited: u64,
    /// Debounced reconnections that reached the subscription session.
    pub resubscribes: u64,
    /// Updates handed to the caller.
    pub events_forwarded: u64,
    /// Updates recognised as this client's own write.
    pub echoes_suppressed: u64,
    /// Provider errors handed to the caller.
    pub errors_forwarded: u64,
    /// Messages from torn-down channels.
    pub stale_messages: u64,
    /// Messages dropped because the session inbox was full.
    pub inbox_overflows: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_origin_taken_from_new_row() {
        let event = UpdateEvent::update(
            json!({"id": "doc1", "updated_at": "t0"}),
            json!({"id": "doc1", "updated_at": "t1"}),
        );
        assert_eq!(event.origin_timestamp, Some(OriginTimestamp::from("t1")));

        let deleted = UpdateEvent::delete(json!({"id": "doc1", "updated_at": "t1"}));
        assert_eq!(deleted.origin_timestamp, None);
    }

    #[test]
    fn test_filter_display_and_match() {
        let filter = FilterExpression::eq("id", "42");
        assert_eq!(filter.to_string(), "id=eq.42");
        assert!(filter.matches(&json!({"id": "42"})));
        assert!(filter.matches(&json!({"id": 42})));
        assert!(!filter.matches(&json!({"id": "43"})));
        assert!(!filter.matches(&json!({"name": "42"})));
    }

    #[test]
    fn test_decode_row_change_payload() {
        let payload = RowChangePayload::from_json(
            r#"{"eventType":"UPDATE","old":{"id":"doc1"},"new":{"id":"doc1","updated_at":"2024-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        let event = UpdateEvent::from(payload);
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(
            event.origin_timestamp,
            Some(OriginTimestamp::from("2024-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn test_decode_delete_with_empty_new() {
        let payload =
            RowChangePayload::from_json(r#"{"eventType":"DELETE","old":{"id":"doc1"},"new":{}}"#)
                .unwrap();
        let event = UpdateEvent::from(payload);
        assert_eq!(event.kind, ChangeKind::Delete);
        assert!(event.new_state.is_none());
        assert_eq!(event.row(), Some(&json!({"id": "doc1"})));
    }

    #[test]
    fn test_reject_update_without_row() {
        let result = RowChangePayload::from_json(r#"{"eventType":"UPDATE","old":{"id":"x"}}"#);
        assert!(matches!(result, Err(SyncError::InvalidPayload(_))));

        let result = RowChangePayload::from_json(r#"{"eventType":"TRUNCATE"}"#);
        assert!(matches!(result, Err(SyncError::Serialization(_))));
    }
}
