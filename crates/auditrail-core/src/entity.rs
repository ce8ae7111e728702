//! Capability interfaces a tracked type implements.
//!
//! The capture pipeline never reflects over entities. Everything it needs is
//! read through these traits: attribute reads by name, optional derived
//! accessors, optional collection attributes, and the external lookups used on
//! the read side (entity loader, actor resolver).

use crate::errors::ExError;
use crate::snapshot::Snapshot;
use serde_json::Value;

/// Read access to named attributes
pub trait AttributeSource {
    /// Value of the named attribute, or `None` if the source has no such attribute
    fn read_attribute(&self, name: &str) -> Option<Value>;
}

impl AttributeSource for serde_json::Map<String, Value> {
    fn read_attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl AttributeSource for Snapshot {
    fn read_attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A business record whose lifecycle is audited
pub trait Tracked: AttributeSource {
    /// Concrete type name stored as `item_type`
    fn item_type(&self) -> &str;

    /// Identity stored as `item_id`
    fn item_id(&self) -> String;

    /// Full current attribute state
    fn attributes(&self) -> Snapshot;

    /// Invoke a derived accessor by name; `None` means no such accessor
    fn invoke_accessor(&self, _name: &str) -> Option<Value> {
        None
    }

    /// Items of a collection attribute; `None` means no such collection
    fn collection(&self, _name: &str) -> Option<Vec<&dyn AttributeSource>> {
        None
    }
}

/// Resolves the weak `(item_type, item_id)` reference of a version
pub trait EntityLoader {
    type Entity;

    /// Load a live entity.
    ///
    /// # Errors
    ///
    /// Implementations return `ExErrorKind::UnknownType` when the type no
    /// longer exists; any other error is a genuine lookup failure.
    fn find(&self, item_type: &str, item_id: &str) -> Result<Option<Self::Entity>, ExError>;
}

/// Resolves an opaque `whodunnit` string to an actor
pub trait ActorResolver {
    type Actor;

    fn resolve(&self, whodunnit: &str) -> Option<Self::Actor>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_map_attribute_source() {
        let mut map = serde_json::Map::new();
        map.insert("sku".to_string(), json!("A-1"));

        assert_eq!(map.read_attribute("sku"), Some(json!("A-1")));
        assert_eq!(map.read_attribute("qty"), None);
    }

    #[test]
    fn test_snapshot_attribute_source_distinguishes_null_from_missing() {
        let mut snap = Snapshot::new();
        snap.insert("note", Value::Null);

        assert_eq!(snap.read_attribute("note"), Some(Value::Null));
        assert_eq!(snap.read_attribute("other"), None);
    }
}
