//! Auditrail Store - SQLite persistence for version records
//!
//! Provides:
//! - SQLite schema with a checksummed migrations framework
//! - `SqliteVersionStore`, the `VersionStore` implementation backed by SQLite

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use errors::Result;
pub use repo::SqliteVersionStore;
