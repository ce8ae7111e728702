//! Core types shared across Auditrail facilities
//!
//! This crate provides foundational types used by the capture pipeline,
//! error handling and logging facilities:
//!
//! - **Correlation types**: RequestId, TraceId, TransactionId
//! - **Execution context**: AuditContext (enablement flag, actor, request metadata)
//! - **Schema constants**: Canonical field keys and event names

pub mod correlation;
pub mod schema;

pub use correlation::{AuditContext, RequestId, TraceId, TransactionId};
