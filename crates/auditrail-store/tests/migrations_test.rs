// Integration tests for the migration framework: fresh apply, idempotency and
// checksum tamper detection.

use auditrail_core::ExErrorKind;
use rusqlite::Connection;

fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap()
}

#[test]
fn test_apply_migrations_on_empty_db() {
    let mut conn = setup_test_db();

    let result = auditrail_store::migrations::apply_migrations(&mut conn);
    assert!(result.is_ok(), "Migrations should succeed: {:?}", result.err());

    let tables = get_table_names(&conn);
    for expected in ["schema_version", "versions", "sqlite_sequence"] {
        assert!(
            tables.contains(&expected.to_string()),
            "Missing table: {}",
            expected
        );
    }
}

#[test]
fn test_reapply_records_each_migration_once() {
    let mut conn = setup_test_db();
    auditrail_store::migrations::apply_migrations(&mut conn).unwrap();
    auditrail_store::migrations::apply_migrations(&mut conn).unwrap();

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM schema_version WHERE migration_id = '001_versions'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_tampered_checksum_is_rejected() {
    let mut conn = setup_test_db();
    auditrail_store::migrations::apply_migrations(&mut conn).unwrap();
    conn.execute(
        "UPDATE schema_version SET checksum = 'deadbeef' WHERE migration_id = '001_versions'",
        [],
    )
    .unwrap();

    let err = auditrail_store::migrations::apply_migrations(&mut conn).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::Persistence);
    assert_eq!(err.op(), Some("migration_checksum"));
}
