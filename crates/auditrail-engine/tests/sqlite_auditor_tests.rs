#![allow(clippy::unwrap_used, clippy::expect_used)]

// Test suite for an Auditor opened from a TOML config over a SQLite file:
// versions survive reopening and the configured limit applies.

mod common;

use auditrail_core::{ExErrorKind, ExtractionScheme, TrackingOptions, VersionEvent};
use auditrail_core_types::TransactionId;
use auditrail_engine::{AuditConfig, Auditor};
use common::Order;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn write_config(dir: &Path, extra: &str) -> AuditConfig {
    let db = dir.join("audit.db");
    let text = format!(
        "database_path = \"{}\"\nlog_profile = \"test\"\n{}",
        db.display(),
        extra
    );
    let path = dir.join("auditrail.toml");
    std::fs::write(&path, text).unwrap();
    AuditConfig::load(&path).unwrap()
}

fn register(auditor: &mut Auditor<auditrail_store::SqliteVersionStore>) {
    auditor.register(
        "Order",
        TrackingOptions::default()
            .also_include("line_items", ExtractionScheme::project(["sku", "qty"])),
    );
}

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let ctx = config.context().with_actor("clerk-9");
    let mut order = Order::new(1, "new").with_line("A", 1);

    {
        let mut auditor = Auditor::open(&config).unwrap();
        register(&mut auditor);

        auditor.after_create(&ctx, TransactionId(1), &order).unwrap();
        auditor.after_commit(&ctx, TransactionId(1), &order).unwrap();

        let changes = order.set("status", "paid");
        auditor
            .after_update(&ctx, TransactionId(2), &order, &changes)
            .unwrap();
        auditor.after_commit(&ctx, TransactionId(2), &order).unwrap();
    }

    let auditor = Auditor::open(&config).unwrap();
    let history = auditor.versions_for("Order", "1").unwrap();
    assert_eq!(
        history.iter().map(|v| v.event).collect::<Vec<_>>(),
        vec![VersionEvent::Create, VersionEvent::Update]
    );
    assert_eq!(history[1].object.get("status"), Some(&json!("new")));
    assert_eq!(history[1].whodunnit.as_deref(), Some("clerk-9"));
    assert_eq!(
        history[0].additional_objects.get("line_items"),
        Some(&json!([{"sku": "A", "qty": 1}]))
    );
}

#[test]
fn test_previous_version_read_from_disk() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "");
    let ctx = config.context();
    let mut order = Order::new(2, "new").with_line("A", 1);

    {
        let mut auditor = Auditor::open(&config).unwrap();
        register(&mut auditor);
        auditor.after_create(&ctx, TransactionId(1), &order).unwrap();
        auditor.after_commit(&ctx, TransactionId(1), &order).unwrap();
    }

    let mut auditor = Auditor::open(&config).unwrap();
    register(&mut auditor);
    order.add_line("B", 3);
    auditor
        .after_update(&ctx, TransactionId(5), &order, &auditrail_core::Snapshot::new())
        .unwrap();
    let updated = auditor
        .after_commit(&ctx, TransactionId(5), &order)
        .unwrap()
        .unwrap();

    let (old, _) = updated.additional_objects_changes.change("line_items").unwrap();
    assert_eq!(old, &json!([{"sku": "A", "qty": 1}]));
}

#[test]
fn test_configured_limit_and_enablement() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), "latest_versions_limit = 2\n");
    let ctx = config.context();
    let mut order = Order::new(3, "s0");

    let mut auditor = Auditor::open(&config).unwrap();
    register(&mut auditor);
    auditor.after_create(&ctx, TransactionId(0), &order).unwrap();
    auditor.after_commit(&ctx, TransactionId(0), &order).unwrap();
    for n in 1..=3u64 {
        let changes = order.set("status", format!("s{n}"));
        auditor
            .after_update(&ctx, TransactionId(n), &order, &changes)
            .unwrap();
        auditor.after_commit(&ctx, TransactionId(n), &order).unwrap();
    }
    assert_eq!(auditor.recent_versions("Order", "3").unwrap().len(), 2);

    let disabled = write_config(dir.path(), "enabled = false\n");
    let ctx = disabled.context();
    let changes = order.set("status", "s4");
    auditor
        .after_update(&ctx, TransactionId(9), &order, &changes)
        .unwrap();
    assert!(auditor
        .after_commit(&ctx, TransactionId(9), &order)
        .unwrap()
        .is_none());
    assert_eq!(auditor.versions_for("Order", "3").unwrap().len(), 4);
}

#[test]
fn test_bad_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("auditrail.toml");

    std::fs::write(&path, "retention_days = 30\n").unwrap();
    let err = AuditConfig::load(&path).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Configuration);

    let err = AuditConfig::load(dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Io);
}
