//! Auditrail Engine - record-store integration layer
//!
//! Provides the [`Auditor`], the callback surface a record store drives
//! (after-create, after-update, before-destroy, after-commit, after-rollback),
//! together with TOML configuration for wiring it to a SQLite store.

pub mod auditor;
pub mod config;

pub use auditor::{Auditor, CacheKey};
pub use config::AuditConfig;
