//! Tracked type schemas used to materialize stored snapshots.
//!
//! A [`TypeSchema`] declares the semantic kind of each attribute of one
//! tracked type. The [`TypeRegistry`] resolves stored `item_type` names to
//! schemas; names that no longer resolve (renamed or removed types) fall back
//! to [`TypeSchema::generic`], which leaves every value raw.

use crate::errors::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name reported by the fallback schema
pub const GENERIC_TYPE_NAME: &str = "generic";

/// Semantic kind of a tracked attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Boolean,
    Integer,
    Float,
    Text,
    Date,
    DateTime,
    /// Structured value kept as-is
    Json,
}

/// Attribute kinds of one tracked type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSchema {
    name: String,
    attributes: BTreeMap<String, AttributeKind>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Untyped fallback schema
    pub fn generic() -> Self {
        Self::new(GENERIC_TYPE_NAME)
    }

    /// Builder: declare one attribute
    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.insert(name.into(), kind);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attribute_kind(&self, name: &str) -> Option<AttributeKind> {
        self.attributes.get(name).copied()
    }

    pub fn is_generic(&self) -> bool {
        self.name == GENERIC_TYPE_NAME && self.attributes.is_empty()
    }
}

/// Resolves tracked type names to their schemas
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    schemas: HashMap<String, TypeSchema>,
    generic: TypeSchema,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
            generic: TypeSchema::generic(),
        }
    }

    /// Register a schema under its own name, replacing any previous one
    pub fn register(&mut self, schema: TypeSchema) -> Option<TypeSchema> {
        self.schemas.insert(schema.name.clone(), schema)
    }

    /// Forget a type (e.g. after it was renamed)
    pub fn unregister(&mut self, name: &str) -> Option<TypeSchema> {
        self.schemas.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Strict lookup
    ///
    /// # Errors
    ///
    /// Returns `AuditError::UnknownType` if the name is not registered.
    pub fn resolve(&self, name: &str) -> Result<&TypeSchema> {
        self.schemas
            .get(name)
            .ok_or_else(|| AuditError::UnknownType {
                item_type: name.to_string(),
            })
    }

    /// Lookup that never fails: unknown names resolve to the generic schema
    pub fn resolve_or_generic(&self, name: &str) -> &TypeSchema {
        match self.resolve(name) {
            Ok(schema) => schema,
            Err(_) => {
                tracing::debug!(item_type = %name, "Unresolved item type, using generic schema");
                &self.generic
            }
        }
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
