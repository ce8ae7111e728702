//! Semantic snapshot container.
//!
//! A [`Snapshot`] is a key-sorted mapping from attribute name to a JSON value
//! (scalar, nested mapping or sequence of mappings). It is used for entity
//! state, change sets and "additional objects" alike.
//!
//! ## Diff format
//!
//! [`Snapshot::diff`] keeps only differing keys, each mapped to the pair
//! `[old, new]`. A key missing on one side is paired with `null`; an absent
//! key and an explicit `null` compare equal. Sequences are compared as whole
//! values, so a change to any element reports both full lists.

pub mod codec;
mod materialize;

pub use materialize::{ChangeView, MaterializedView, TypedValue};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered attribute-name → value mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(BTreeMap<String, Value>);

impl Snapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, Value> {
        self.0
    }

    /// Render as a JSON object value
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }

    /// Copy of this snapshot without the given keys
    pub fn except<I, S>(&self, keys: I) -> Snapshot
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = self.clone();
        for key in keys {
            out.0.remove(key.as_ref());
        }
        out
    }

    /// Copy of this snapshot without blank values (see [`is_blank`])
    pub fn compact(&self) -> Snapshot {
        self.0
            .iter()
            .filter(|(_, v)| !is_blank(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Keys whose values differ between `self` (old) and `other` (new),
    /// each mapped to `[old, new]`.
    pub fn diff(&self, other: &Snapshot) -> Snapshot {
        let keys: BTreeSet<&String> = self.0.keys().chain(other.0.keys()).collect();
        let mut out = Snapshot::new();
        for key in keys {
            let old = self.0.get(key).unwrap_or(&Value::Null);
            let new = other.0.get(key).unwrap_or(&Value::Null);
            if old != new {
                out.0
                    .insert(key.clone(), Value::Array(vec![old.clone(), new.clone()]));
            }
        }
        out
    }

    /// Every key mapped to `[value, null]`, including keys already `null`
    pub fn removed(&self) -> Snapshot {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), Value::Array(vec![v.clone(), Value::Null])))
            .collect()
    }

    /// Fold the changes of a later save into `self`.
    ///
    /// A key changed twice keeps its first `old` and takes the later `new`;
    /// it is dropped if the two end up equal.
    pub fn merge_changes(&mut self, later: &Snapshot) {
        for (key, value) in &later.0 {
            let Value::Array(pair) = value else {
                continue;
            };
            let [old, new] = pair.as_slice() else {
                continue;
            };
            let old = match self.change(key) {
                Some((first, _)) => first.clone(),
                None => old.clone(),
            };
            if &old == new {
                self.0.remove(key);
            } else {
                self.0
                    .insert(key.clone(), Value::Array(vec![old, new.clone()]));
            }
        }
    }

    /// Read one `[old, new]` pair from a diff snapshot
    pub fn change(&self, key: &str) -> Option<(&Value, &Value)> {
        match self.0.get(key) {
            Some(Value::Array(pair)) if pair.len() == 2 => Some((&pair[0], &pair[1])),
            _ => None,
        }
    }

    /// Rebuild the state before `changes` were applied to `self`.
    ///
    /// Entries of `changes` that are not `[old, new]` pairs are ignored.
    pub fn revert(&self, changes: &Snapshot) -> Snapshot {
        let mut out = self.clone();
        for key in changes.keys() {
            if let Some((old, _)) = changes.change(key) {
                out.0.insert(key.clone(), old.clone());
            }
        }
        out
    }
}

/// True for `null`, `false`, `""`, `[]` and `{}`
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Number(_) => false,
    }
}

impl From<BTreeMap<String, Value>> for Snapshot {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl From<serde_json::Map<String, Value>> for Snapshot {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Snapshot {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
