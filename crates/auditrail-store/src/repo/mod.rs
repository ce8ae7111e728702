//! Repository layer for version records

mod sqlite_version_store;

pub use sqlite_version_store::SqliteVersionStore;
