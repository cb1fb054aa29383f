//! Own-write suppression and remote-change notices.

mod common;

use common::{doc, Harness, RESOURCE};
use runsheet_sync::{ChangeKind, DocumentId, Notice, UpdateEvent};
use serde_json::json;

fn subscribed(h: &Harness) -> runsheet_sync::LifecycleBinder {
    let mut binder = h.binder();
    binder.set_target(doc("doc1"), true);
    h.at(&mut binder, 500);
    assert_eq!(h.feed.live_channels(), 1);
    binder
}

#[test]
fn test_own_write_suppressed_then_remote_forwarded() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    h.remote_update("doc1", "t1");
    binder.poll();
    assert_eq!(h.update_count(), 0);
    assert_eq!(h.notice_count(), 0);

    h.remote_update("doc1", "t2");
    binder.poll();
    assert_eq!(h.update_count(), 1);
    assert_eq!(h.notice_count(), 1);
    assert_eq!(
        h.notifier.notices.lock()[0],
        Notice::RemoteChange {
            document_id: DocumentId::from("doc1")
        }
    );

    let stats = binder.stats().unwrap();
    assert_eq!(stats.echoes_suppressed, 1);
    assert_eq!(stats.events_forwarded, 1);
}

#[test]
fn test_missing_origin_always_forwarded() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    h.feed.publish(
        RESOURCE,
        UpdateEvent::update(json!({"id": "doc1"}), json!({"id": "doc1"})),
    );
    binder.poll();

    assert_eq!(h.update_count(), 1);
    assert!(h.updates.lock()[0].origin_timestamp.is_none());
}

#[test]
fn test_only_latest_mark_suppresses() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    binder.mark_own_update("t2");
    h.remote_update("doc1", "t1");
    h.remote_update("doc1", "t2");
    binder.poll();

    assert_eq!(h.update_count(), 1);
    assert_eq!(
        h.updates.lock()[0].origin_timestamp.as_ref().map(|o| o.0.as_str()),
        Some("t1")
    );
}

#[test]
fn test_insert_and_delete_never_notify() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    h.feed.publish(
        RESOURCE,
        UpdateEvent::insert(json!({"id": "doc1", "updated_at": "t3"})),
    );
    h.feed.publish(
        RESOURCE,
        UpdateEvent::delete(json!({"id": "doc1", "updated_at": "t3"})),
    );
    binder.poll();

    let kinds: Vec<ChangeKind> = h.updates.lock().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Delete]);
    assert_eq!(h.notice_count(), 0);
}

#[test]
fn test_marker_handle_shared_with_binder() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    let marker = binder.marker();
    marker.mark_own_update("saved-at-1");
    h.remote_update("doc1", "saved-at-1");
    binder.poll();

    assert_eq!(h.update_count(), 0);
}

#[test]
fn test_marker_survives_resubscribe() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    h.network_at(&mut binder, 600, false);
    h.network_at(&mut binder, 700, true);
    h.at(&mut binder, 2_700);
    assert_eq!(h.feed.stats().created, 2);

    h.remote_update("doc1", "t1");
    binder.poll();
    assert_eq!(h.update_count(), 0);
}

#[test]
fn test_marker_cleared_when_document_changes() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    binder.set_target(doc("doc2"), true);
    h.at(&mut binder, 1_000);

    h.remote_update("doc2", "t1");
    binder.poll();
    assert_eq!(h.update_count(), 1);
    assert!(binder.marker().current().is_none());
}

#[test]
fn test_marker_kept_when_same_document_reenabled() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    binder.mark_own_update("t1");
    binder.set_target(doc("doc1"), false);
    binder.set_target(doc("doc1"), true);
    h.at(&mut binder, 1_000);

    h.remote_update("doc1", "t1");
    binder.poll();
    assert_eq!(h.update_count(), 0);
}

#[test]
fn test_events_for_other_documents_not_delivered() {
    let h = Harness::new();
    let mut binder = subscribed(&h);

    assert_eq!(h.remote_update("doc2", "t1"), 0);
    binder.poll();
    assert_eq!(h.update_count(), 0);
}

#[test]
fn test_events_before_first_channel_not_delivered() {
    let h = Harness::new();
    let mut binder = h.binder();
    binder.set_target(doc("doc1"), true);

    assert_eq!(h.remote_update("doc1", "t1"), 0);
    h.at(&mut binder, 500);
    assert_eq!(h.update_count(), 0);
}
