use crate::entity::Tracked;
use crate::errors::{AuditError, Result};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// How one "also include" attribute is derived from a tracked entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "with", rename_all = "snake_case")]
pub enum ExtractionScheme {
    /// Read the entity's own attribute of the declared name
    DirectAttribute,
    /// Call the named accessor and store its result verbatim
    DerivedAccessor(String),
    /// The declared attribute is a collection; project these sub-attributes of each item
    CollectionProjection(Vec<String>),
}

impl ExtractionScheme {
    pub fn accessor(name: impl Into<String>) -> Self {
        ExtractionScheme::DerivedAccessor(name.into())
    }

    /// Per-item projection. An empty list means a direct attribute read.
    pub fn project<I, S>(sub_attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let subs: Vec<String> = sub_attributes.into_iter().map(Into::into).collect();
        if subs.is_empty() {
            ExtractionScheme::DirectAttribute
        } else {
            ExtractionScheme::CollectionProjection(subs)
        }
    }
}

/// Evaluate every scheme against `entity`, keyed by declared attribute name.
///
/// The entity is only read. A missing attribute, accessor, collection or
/// item sub-attribute means the registration is wrong and is returned as an
/// error rather than skipped.
///
/// # Errors
/// - `MissingAttribute` - a direct attribute or collection does not exist
/// - `MissingAccessor` - a derived accessor does not exist
/// - `MissingSubAttribute` - a collection item lacks a projected sub-attribute
pub fn evaluate(
    entity: &dyn Tracked,
    schemes: &BTreeMap<String, ExtractionScheme>,
) -> Result<Snapshot> {
    let mut out = Snapshot::new();
    for (name, scheme) in schemes {
        let value = evaluate_one(entity, name, scheme)?;
        out.insert(name.clone(), value);
    }
    Ok(out)
}

fn evaluate_one(entity: &dyn Tracked, name: &str, scheme: &ExtractionScheme) -> Result<Value> {
    match scheme {
        ExtractionScheme::DirectAttribute => {
            entity
                .read_attribute(name)
                .ok_or_else(|| AuditError::MissingAttribute {
                    item_type: entity.item_type().to_string(),
                    attribute: name.to_string(),
                })
        }
        ExtractionScheme::DerivedAccessor(accessor) => entity
            .invoke_accessor(accessor)
            .ok_or_else(|| AuditError::MissingAccessor {
                item_type: entity.item_type().to_string(),
                accessor: accessor.clone(),
            }),
        ExtractionScheme::CollectionProjection(subs) => {
            let items = entity
                .collection(name)
                .ok_or_else(|| AuditError::MissingAttribute {
                    item_type: entity.item_type().to_string(),
                    attribute: name.to_string(),
                })?;

            let mut projected = Vec::with_capacity(items.len());
            for (index, item) in items.into_iter().enumerate() {
                let mut row = Map::new();
                for sub in subs {
                    let value =
                        item.read_attribute(sub)
                            .ok_or_else(|| AuditError::MissingSubAttribute {
                                item_type: entity.item_type().to_string(),
                                attribute: name.to_string(),
                                index,
                                sub_attribute: sub.clone(),
                            })?;
                    row.insert(sub.clone(), value);
                }
                projected.push(Value::Object(row));
            }
            Ok(Value::Array(projected))
        }
    }
}
