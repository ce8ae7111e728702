//! Storage encoding for snapshot columns.
//!
//! Each snapshot-valued column is stored as one JSON document. A missing
//! column (SQL `NULL`) or a literal `null` decodes to the type's default.

use crate::errors::{AuditError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encode a column value as a JSON document
pub fn encode<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(AuditError::from)
}

/// Decode a column value, treating absence and `null` as the default value
pub fn decode<T: DeserializeOwned + Default>(raw: Option<&str>) -> Result<T> {
    match raw.map(str::trim) {
        None | Some("") | Some("null") => Ok(T::default()),
        Some(text) => serde_json::from_str(text).map_err(AuditError::from),
    }
}
