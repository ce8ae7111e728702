//! Version records and their read-side accessors.

use crate::entity::{ActorResolver, EntityLoader};
use crate::errors::{AuditError, ExError, ExErrorKind};
use crate::schema::{TypeRegistry, TypeSchema};
use crate::snapshot::{ChangeView, MaterializedView, Snapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Columns stripped from `object_changes` on read
pub const NON_SEMANTIC_COLUMNS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Lifecycle event a version records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionEvent {
    Create,
    Update,
    Destroy,
}

impl VersionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionEvent::Create => "create",
            VersionEvent::Update => "update",
            VersionEvent::Destroy => "destroy",
        }
    }
}

impl std::fmt::Display for VersionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionEvent {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(VersionEvent::Create),
            "update" => Ok(VersionEvent::Update),
            "destroy" => Ok(VersionEvent::Destroy),
            other => Err(AuditError::Serialization {
                message: format!("unknown version event '{other}'"),
            }),
        }
    }
}

/// A version about to be persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVersion {
    pub item_type: String,
    pub item_id: String,
    pub event: VersionEvent,
    pub object: Snapshot,
    pub object_changes: Snapshot,
    pub additional_objects: Snapshot,
    pub additional_objects_changes: Snapshot,
    pub whodunnit: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl NewVersion {
    /// Attach the id assigned by the store
    pub fn into_record(self, id: i64) -> VersionRecord {
        VersionRecord {
            id,
            item_type: self.item_type,
            item_id: self.item_id,
            event: self.event,
            object: self.object,
            object_changes: self.object_changes,
            additional_objects: self.additional_objects,
            additional_objects_changes: self.additional_objects_changes,
            whodunnit: self.whodunnit,
            metadata: self.metadata,
            created_at: self.created_at,
        }
    }
}

/// One persisted, immutable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: i64,
    pub item_type: String,
    pub item_id: String,
    pub event: VersionEvent,
    pub object: Snapshot,
    pub object_changes: Snapshot,
    pub additional_objects: Snapshot,
    pub additional_objects_changes: Snapshot,
    pub whodunnit: Option<String>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Schema of the tracked type, or the generic one if it no longer resolves
    pub fn item_schema<'a>(&self, types: &'a TypeRegistry) -> &'a TypeSchema {
        types.resolve_or_generic(&self.item_type)
    }

    pub fn object_snapshot(&self, types: &TypeRegistry) -> MaterializedView {
        self.object.materialize(self.item_schema(types))
    }

    pub fn additional_objects_snapshot(&self, types: &TypeRegistry) -> MaterializedView {
        self.additional_objects.materialize(self.item_schema(types))
    }

    /// Stored diff without id and timestamp columns
    pub fn object_changes(&self) -> Snapshot {
        self.object_changes.except(NON_SEMANTIC_COLUMNS)
    }

    pub fn object_snapshot_changes(&self, types: &TypeRegistry) -> ChangeView {
        self.object_changes()
            .materialize_changes(self.item_schema(types))
    }

    pub fn additional_objects_snapshot_changes(&self, types: &TypeRegistry) -> ChangeView {
        self.additional_objects_changes
            .materialize_changes(self.item_schema(types))
    }

    /// Resolve the weak reference to the live entity.
    ///
    /// An unknown type or a missing row is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Any other loader failure is returned unchanged.
    pub fn item<L: EntityLoader>(&self, loader: &L) -> Result<Option<L::Entity>, ExError> {
        match loader.find(&self.item_type, &self.item_id) {
            Ok(entity) => Ok(entity),
            Err(e) if e.kind() == ExErrorKind::UnknownType => {
                tracing::debug!(
                    item_type = %self.item_type,
                    item_id = %self.item_id,
                    "Tracked type no longer resolves"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// The actor who made this change, if recorded and known to the resolver
    pub fn who<R: ActorResolver>(&self, resolver: &R) -> Option<R::Actor> {
        self.whodunnit
            .as_deref()
            .and_then(|whodunnit| resolver.resolve(whodunnit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeKind;
    use crate::snapshot::TypedValue;
    use serde_json::json;

    fn record() -> VersionRecord {
        VersionRecord {
            id: 3,
            item_type: "Order".to_string(),
            item_id: "42".to_string(),
            event: VersionEvent::Update,
            object: serde_json::from_value(json!({"status": "new", "total": "9.5"})).unwrap(),
            object_changes: serde_json::from_value(json!({
                "status": ["new", "paid"],
                "updated_at": ["2024-01-01", "2024-01-02"],
                "id": [null, 42]
            }))
            .unwrap(),
            additional_objects: Snapshot::new(),
            additional_objects_changes: Snapshot::new(),
            whodunnit: Some("user-7".to_string()),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_event_round_trip() {
        for e in [VersionEvent::Create, VersionEvent::Update, VersionEvent::Destroy] {
            assert_eq!(e.as_str().parse::<VersionEvent>().unwrap(), e);
        }
        assert!("touch".parse::<VersionEvent>().is_err());
    }

    #[test]
    fn test_object_changes_scrubs_audit_columns() {
        let changes = record().object_changes();
        let keys: Vec<&String> = changes.keys().collect();
        assert_eq!(keys, vec!["status"]);
    }

    #[test]
    fn test_object_snapshot_uses_resolved_schema() {
        let mut types = TypeRegistry::new();
        types.register(TypeSchema::new("Order").with_attribute("total", AttributeKind::Float));

        let view = record().object_snapshot(&types);
        assert_eq!(view.get("total"), Some(&TypedValue::Float(9.5)));
        assert!(!view.is_fallback());
    }

    #[test]
    fn test_object_snapshot_falls_back_for_unknown_type() {
        let view = record().object_snapshot(&TypeRegistry::new());
        assert!(view.is_fallback());
        assert_eq!(view.get("total"), Some(&TypedValue::Raw(json!("9.5"))));
    }

    struct Loader;

    impl EntityLoader for Loader {
        type Entity = String;

        fn find(&self, item_type: &str, item_id: &str) -> Result<Option<String>, ExError> {
            match item_type {
                "Order" if item_id == "42" => Ok(Some("order 42".to_string())),
                "Order" => Ok(None),
                "Broken" => Err(ExError::new(ExErrorKind::Io).with_message("db down")),
                _ => Err(ExError::new(ExErrorKind::UnknownType)),
            }
        }
    }

    #[test]
    fn test_item_resolution() {
        let mut r = record();
        assert_eq!(r.item(&Loader).unwrap(), Some("order 42".to_string()));

        r.item_id = "43".to_string();
        assert_eq!(r.item(&Loader).unwrap(), None);

        r.item_type = "RenamedAway".to_string();
        assert_eq!(r.item(&Loader).unwrap(), None);

        r.item_type = "Broken".to_string();
        assert_eq!(r.item(&Loader).unwrap_err().kind(), ExErrorKind::Io);
    }

    struct Users;

    impl ActorResolver for Users {
        type Actor = String;

        fn resolve(&self, whodunnit: &str) -> Option<String> {
            (whodunnit == "user-7").then(|| "Ada".to_string())
        }
    }

    #[test]
    fn test_who_resolves_actor() {
        let mut r = record();
        assert_eq!(r.who(&Users), Some("Ada".to_string()));

        r.whodunnit = Some("user-8".to_string());
        assert_eq!(r.who(&Users), None);

        r.whodunnit = None;
        assert_eq!(r.who(&Users), None);
    }
}
