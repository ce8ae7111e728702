// Integration tests for SqliteVersionStore: lossless snapshot round-trips,
// query ordering and limits, and durability across reopen.

use auditrail_core::{
    NewVersion, Snapshot, SortOrder, VersionEvent, VersionQuery, VersionStore,
};
use auditrail_store::SqliteVersionStore;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use tempfile::TempDir;

fn snapshot(value: serde_json::Value) -> Snapshot {
    serde_json::from_value(value).unwrap()
}

fn version(item_id: &str, event: VersionEvent, offset_ms: i64) -> NewVersion {
    NewVersion {
        item_type: "Order".to_string(),
        item_id: item_id.to_string(),
        event,
        object: snapshot(json!({"status": "new", "total": 12.5})),
        object_changes: snapshot(json!({"status": [null, "new"]})),
        additional_objects: snapshot(json!({
            "line_items": [{"sku": "A", "qty": 1}, {"sku": "B", "qty": 2}]
        })),
        additional_objects_changes: Snapshot::new(),
        whodunnit: Some("clerk-1".to_string()),
        metadata: [("ip".to_string(), json!("10.0.0.1"))].into_iter().collect(),
        created_at: Utc::now() + Duration::milliseconds(offset_ms),
    }
}

#[test]
fn test_round_trip_preserves_every_column() {
    let mut store = SqliteVersionStore::open_in_memory().unwrap();
    let original = version("1", VersionEvent::Create, 0);

    let id = store.create_version(original.clone()).unwrap();
    let read = store
        .query_versions(&VersionQuery::for_item("Order", "1"))
        .unwrap()
        .pop()
        .unwrap();

    assert_eq!(read.id, id);
    assert_eq!(read.event, original.event);
    assert_eq!(read.object, original.object);
    assert_eq!(read.object_changes, original.object_changes);
    assert_eq!(read.additional_objects, original.additional_objects);
    assert_eq!(read.additional_objects_changes, original.additional_objects_changes);
    assert_eq!(read.whodunnit, original.whodunnit);
    assert_eq!(read.metadata, original.metadata);
    assert_eq!(
        read.created_at.timestamp_millis(),
        original.created_at.timestamp_millis()
    );
}

#[test]
fn test_query_order_and_limit() {
    let mut store = SqliteVersionStore::open_in_memory().unwrap();
    store.create_version(version("1", VersionEvent::Create, 0)).unwrap();
    store.create_version(version("2", VersionEvent::Create, 5)).unwrap();
    store.create_version(version("1", VersionEvent::Update, 10)).unwrap();
    store.create_version(version("1", VersionEvent::Destroy, 20)).unwrap();

    let newest = store
        .query_versions(&VersionQuery::for_item("Order", "1").limit(2))
        .unwrap();
    assert_eq!(
        newest.iter().map(|v| v.event).collect::<Vec<_>>(),
        vec![VersionEvent::Destroy, VersionEvent::Update]
    );

    let oldest = store
        .query_versions(&VersionQuery::for_type("Order").order(SortOrder::OldestFirst))
        .unwrap();
    assert_eq!(
        oldest.iter().map(|v| v.item_id.as_str()).collect::<Vec<_>>(),
        vec!["1", "2", "1", "1"]
    );

    let none = store
        .query_versions(&VersionQuery::for_type("Invoice"))
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn test_versions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.db");

    {
        let mut store = SqliteVersionStore::open(&path).unwrap();
        store.create_version(version("7", VersionEvent::Create, 0)).unwrap();
    }

    let store = SqliteVersionStore::open(&path).unwrap();
    let latest = store.latest_version("Order", "7").unwrap().unwrap();
    assert_eq!(latest.event, VersionEvent::Create);
    assert_eq!(latest.whodunnit.as_deref(), Some("clerk-1"));
}

#[test]
fn test_unknown_event_text_is_serialization_error() {
    let store = SqliteVersionStore::open_in_memory().unwrap();
    store
        .connection()
        .execute_batch("PRAGMA ignore_check_constraints = ON;")
        .unwrap();
    store
        .connection()
        .execute(
            "INSERT INTO versions (item_type, item_id, event, created_at)
             VALUES ('Order', '9', 'touch', 0)",
            [],
        )
        .unwrap();

    let err = store
        .query_versions(&VersionQuery::for_item("Order", "9"))
        .unwrap_err();
    assert_eq!(err.kind(), auditrail_core::ExErrorKind::Serialization);
}

#[test]
fn test_metadata_defaults_to_empty_map() {
    let mut store = SqliteVersionStore::open_in_memory().unwrap();
    let mut v = version("3", VersionEvent::Update, 0);
    v.metadata = BTreeMap::new();
    store.create_version(v).unwrap();

    let read = store.latest_version("Order", "3").unwrap().unwrap();
    assert!(read.metadata.is_empty());
}
