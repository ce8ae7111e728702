//! Type-aware materialization of stored snapshots.
//!
//! Coercion is total: a value that does not fit its declared kind, a key the
//! schema does not know, and every key under the generic schema are kept as
//! [`TypedValue::Raw`]. Materializing `view.to_snapshot()` again yields the
//! same view.

use super::Snapshot;
use crate::schema::{AttributeKind, TypeSchema};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};
use std::collections::BTreeMap;

const DATE_FORMAT: &str = "%Y-%m-%d";
const NAIVE_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// A stored value coerced to the kind it has on a live instance
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Value left untouched (unknown key, generic schema, or failed coercion)
    Raw(Value),
}

impl TypedValue {
    /// Coerce `value` into `kind`; `None` keeps it raw
    pub fn coerce(kind: Option<AttributeKind>, value: &Value) -> TypedValue {
        if value.is_null() {
            return TypedValue::Null;
        }
        let coerced = match kind {
            None | Some(AttributeKind::Json) => None,
            Some(AttributeKind::Boolean) => coerce_bool(value),
            Some(AttributeKind::Integer) => coerce_integer(value),
            Some(AttributeKind::Float) => coerce_float(value),
            Some(AttributeKind::Text) => coerce_text(value),
            Some(AttributeKind::Date) => value.as_str().and_then(parse_date).map(TypedValue::Date),
            Some(AttributeKind::DateTime) => value
                .as_str()
                .and_then(parse_datetime)
                .map(TypedValue::DateTime),
        };
        coerced.unwrap_or_else(|| TypedValue::Raw(value.clone()))
    }

    /// Canonical storage form of this value
    pub fn to_value(&self) -> Value {
        match self {
            TypedValue::Null => Value::Null,
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Float(f) => Number::from_f64(*f).map_or(Value::Null, Value::Number),
            TypedValue::Text(s) => Value::String(s.clone()),
            TypedValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            TypedValue::DateTime(dt) => {
                Value::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            TypedValue::Raw(v) => v.clone(),
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, TypedValue::Raw(_))
    }
}

fn coerce_bool(value: &Value) -> Option<TypedValue> {
    let b = match value {
        Value::Bool(b) => *b,
        Value::Number(n) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => return None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => true,
            "false" | "f" | "0" | "no" => false,
            _ => return None,
        },
        _ => return None,
    };
    Some(TypedValue::Boolean(b))
}

fn coerce_integer(value: &Value) -> Option<TypedValue> {
    match value {
        Value::Number(n) => n.as_i64().map(TypedValue::Integer).or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| TypedValue::Integer(f as i64))
        }),
        Value::String(s) => s.trim().parse::<i64>().ok().map(TypedValue::Integer),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<TypedValue> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    f.is_finite().then_some(TypedValue::Float(f))
}

fn coerce_text(value: &Value) -> Option<TypedValue> {
    match value {
        Value::String(s) => Some(TypedValue::Text(s.clone())),
        Value::Number(n) => Some(TypedValue::Text(n.to_string())),
        Value::Bool(b) => Some(TypedValue::Text(b.to_string())),
        _ => None,
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .ok()
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// A snapshot with each value coerced against a type schema
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedView {
    type_name: String,
    fallback: bool,
    values: BTreeMap<String, TypedValue>,
}

impl MaterializedView {
    /// Name of the schema the view was materialized against
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// True when materialized under the generic fallback schema
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn get(&self, key: &str) -> Option<&TypedValue> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TypedValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Back to the canonical stored form
    pub fn to_snapshot(&self) -> Snapshot {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect()
    }
}

/// A diff snapshot with both sides of every pair coerced
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeView {
    type_name: String,
    fallback: bool,
    changes: BTreeMap<String, (TypedValue, TypedValue)>,
}

impl ChangeView {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn get(&self, key: &str) -> Option<&(TypedValue, TypedValue)> {
        self.changes.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &(TypedValue, TypedValue))> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl Snapshot {
    /// Coerce every value into the kind declared by `schema`
    pub fn materialize(&self, schema: &TypeSchema) -> MaterializedView {
        let values = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), TypedValue::coerce(schema.attribute_kind(k), v)))
            .collect();
        MaterializedView {
            type_name: schema.name().to_string(),
            fallback: schema.is_generic(),
            values,
        }
    }

    /// Coerce both sides of every `[old, new]` pair of a diff snapshot.
    ///
    /// Entries that are not pairs are dropped with a warning.
    pub fn materialize_changes(&self, schema: &TypeSchema) -> ChangeView {
        let mut changes = BTreeMap::new();
        for key in self.0.keys() {
            match self.change(key) {
                Some((old, new)) => {
                    let kind = schema.attribute_kind(key);
                    changes.insert(
                        key.clone(),
                        (TypedValue::coerce(kind, old), TypedValue::coerce(kind, new)),
                    );
                }
                None => {
                    tracing::warn!(key = %key, item_type = %schema.name(), "Skipping malformed change entry");
                }
            }
        }
        ChangeView {
            type_name: schema.name().to_string(),
            fallback: schema.is_generic(),
            changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order_schema() -> TypeSchema {
        TypeSchema::new("Order")
            .with_attribute("paid", AttributeKind::Boolean)
            .with_attribute("qty", AttributeKind::Integer)
            .with_attribute("total", AttributeKind::Float)
            .with_attribute("status", AttributeKind::Text)
            .with_attribute("due_on", AttributeKind::Date)
            .with_attribute("paid_at", AttributeKind::DateTime)
            .with_attribute("extra", AttributeKind::Json)
    }

    fn snap(v: Value) -> Snapshot {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_coerces_string_encodings() {
        let view = snap(json!({
            "paid": "t",
            "qty": "3",
            "total": "12.50",
            "status": "new",
            "due_on": "2024-02-29",
            "paid_at": "2024-03-01 10:15:00",
            "extra": {"a": 1}
        }))
        .materialize(&order_schema());

        assert_eq!(view.get("paid"), Some(&TypedValue::Boolean(true)));
        assert_eq!(view.get("qty"), Some(&TypedValue::Integer(3)));
        assert_eq!(view.get("total"), Some(&TypedValue::Float(12.5)));
        assert_eq!(view.get("status"), Some(&TypedValue::Text("new".into())));
        assert_eq!(
            view.get("due_on"),
            Some(&TypedValue::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()))
        );
        assert_eq!(
            view.get("paid_at"),
            Some(&TypedValue::DateTime(
                Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap()
            ))
        );
        assert_eq!(view.get("extra"), Some(&TypedValue::Raw(json!({"a": 1}))));
        assert!(!view.is_fallback());
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let view = snap(json!({"mystery": "2024-01-01"})).materialize(&order_schema());
        assert_eq!(view.get("mystery"), Some(&TypedValue::Raw(json!("2024-01-01"))));
    }

    #[test]
    fn test_failed_coercion_keeps_raw() {
        let view = snap(json!({"qty": "lots", "due_on": "someday"})).materialize(&order_schema());
        assert_eq!(view.get("qty"), Some(&TypedValue::Raw(json!("lots"))));
        assert_eq!(view.get("due_on"), Some(&TypedValue::Raw(json!("someday"))));
    }

    #[test]
    fn test_generic_schema_leaves_everything_raw() {
        let view = snap(json!({"qty": "3", "n": null})).materialize(&TypeSchema::generic());
        assert!(view.is_fallback());
        assert_eq!(view.get("qty"), Some(&TypedValue::Raw(json!("3"))));
        assert_eq!(view.get("n"), Some(&TypedValue::Null));
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let schema = order_schema();
        let view = snap(json!({
            "paid": 1, "qty": 4.0, "total": 3, "due_on": "2024-05-06T07:08:09Z",
            "paid_at": "2024-05-06T07:08:09.123+02:00", "status": 17
        }))
        .materialize(&schema);

        let again = view.to_snapshot().materialize(&schema);
        assert_eq!(again, view);
    }

    #[test]
    fn test_materialize_changes_coerces_both_sides() {
        let changes = snap(json!({"qty": ["1", "2"], "broken": 5}));
        let view = changes.materialize_changes(&order_schema());

        assert_eq!(
            view.get("qty"),
            Some(&(TypedValue::Integer(1), TypedValue::Integer(2)))
        );
        assert!(view.get("broken").is_none());
        assert_eq!(view.len(), 1);
    }
}
