//! Persistence contract for version records.
//!
//! [`VersionStore`] is the seam between the capture pipeline and whatever
//! backend holds the append-only history. [`MemoryVersionStore`] keeps
//! everything in a `Vec` and is used by tests and embedders without a
//! database; the SQLite backend lives in `auditrail-store`.

use crate::errors::ExError;
use crate::version::{NewVersion, VersionRecord};

/// Ordering of a version query by `(created_at, id)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Filter for [`VersionStore::query_versions`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionQuery {
    pub item_type: String,
    /// `None` selects every item of the type
    pub item_id: Option<String>,
    pub order: SortOrder,
    pub limit: Option<usize>,
}

impl VersionQuery {
    /// All versions of one type, newest first
    pub fn for_type(item_type: impl Into<String>) -> Self {
        Self {
            item_type: item_type.into(),
            item_id: None,
            order: SortOrder::NewestFirst,
            limit: None,
        }
    }

    /// History of one entity, newest first
    pub fn for_item(item_type: impl Into<String>, item_id: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id.into()),
            ..Self::for_type(item_type)
        }
    }

    pub fn order(mut self, order: SortOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True if `record` passes the type/item filter
    pub fn matches(&self, record: &VersionRecord) -> bool {
        record.item_type == self.item_type
            && self
                .item_id
                .as_deref()
                .map_or(true, |id| record.item_id == id)
    }
}

/// Append-only storage of version records
pub trait VersionStore {
    /// Persist one version atomically and return its id
    ///
    /// # Errors
    ///
    /// Returns `ExErrorKind::Persistence` (or `Serialization`) on failure.
    fn create_version(&mut self, version: NewVersion) -> Result<i64, ExError>;

    /// Versions matching `query`, ordered by `(created_at, id)`
    ///
    /// # Errors
    ///
    /// Returns `ExErrorKind::Persistence` if the backend cannot be read.
    fn query_versions(&self, query: &VersionQuery) -> Result<Vec<VersionRecord>, ExError>;

    /// Most recent persisted version of one entity
    ///
    /// # Errors
    ///
    /// Propagates query failures.
    fn latest_version(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Option<VersionRecord>, ExError> {
        let mut found = self.query_versions(&VersionQuery::for_item(item_type, item_id).limit(1))?;
        Ok(found.pop())
    }
}

/// In-memory version store
#[derive(Debug, Clone, Default)]
pub struct MemoryVersionStore {
    records: Vec<VersionRecord>,
    next_id: i64,
}

impl MemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record in insertion order
    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl VersionStore for MemoryVersionStore {
    fn create_version(&mut self, version: NewVersion) -> Result<i64, ExError> {
        self.next_id += 1;
        let id = self.next_id;
        self.records.push(version.into_record(id));
        Ok(id)
    }

    fn query_versions(&self, query: &VersionQuery) -> Result<Vec<VersionRecord>, ExError> {
        let mut out: Vec<VersionRecord> = self
            .records
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        out.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if query.order == SortOrder::NewestFirst {
            out.reverse();
        }
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }
}
