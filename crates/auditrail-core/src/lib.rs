//! Auditrail Core - audit-trail capture kernel
//!
//! This crate provides the capture pipeline for versioning tracked entities:
//! - Semantic snapshots with diff and type-aware materialization
//! - Extraction schemes for "additional objects" travelling with an entity
//! - Per-transaction lifecycle capture caches
//! - The commit-gated version writer
//! - Version records with read-side accessors
//! - The persistence contract and an in-memory implementation

pub mod capture;
pub mod entity;
pub mod errors;
pub mod logging_facility;
pub mod registration;
pub mod schema;
pub mod scheme;
pub mod snapshot;
pub mod store;
pub mod version;
pub mod writer;

// Re-export commonly used types
pub use capture::{CaptureCache, PendingExtras};
pub use entity::{ActorResolver, AttributeSource, EntityLoader, Tracked};
pub use errors::{AuditError, ExError, ExErrorKind, Result};
pub use registration::{Registration, TrackingOptions};
pub use schema::{AttributeKind, TypeRegistry, TypeSchema};
pub use scheme::ExtractionScheme;
pub use snapshot::{ChangeView, MaterializedView, Snapshot, TypedValue};
pub use store::{MemoryVersionStore, SortOrder, VersionQuery, VersionStore};
pub use version::{NewVersion, VersionEvent, VersionRecord};
pub use writer::finalize;
