//! The record-store callback surface.
//!
//! The [`Auditor`] owns one [`CaptureCache`] per `(transaction, entity)` and
//! drives it from the record store's lifecycle signals. Hooks only stage
//! data; a version is written when `after_commit` arrives for that entity,
//! and nothing is written for a transaction that rolls back.
//!
//! ## Previous version
//!
//! Diffing "additional objects" needs the previous version of the entity.
//! It is resolved persisted-first: the most recent stored version wins; if
//! the entity has no stored history yet, the most recent in-flight snapshot
//! (captured by a hook in another transaction whose commit has not been
//! reported) is used.

#![allow(clippy::result_large_err)]

use crate::config::{AuditConfig, DEFAULT_LATEST_VERSIONS_LIMIT};
use auditrail_core::errors::{AuditError, ExError};
use auditrail_core::{
    finalize, CaptureCache, Registration, Snapshot, SortOrder, Tracked, TrackingOptions,
    TypeRegistry, TypeSchema, VersionQuery, VersionRecord, VersionStore,
};
use auditrail_core_types::{AuditContext, TransactionId};
use auditrail_store::SqliteVersionStore;
use std::collections::HashMap;

/// Identity of one capture cache
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub txn: TransactionId,
    pub item_type: String,
    pub item_id: String,
}

impl CacheKey {
    pub fn new(txn: TransactionId, entity: &dyn Tracked) -> Self {
        Self {
            txn,
            item_type: entity.item_type().to_string(),
            item_id: entity.item_id(),
        }
    }
}

/// Additional-objects snapshot staged by a transaction not yet committed
#[derive(Debug, Clone)]
struct InFlightVersion {
    key: CacheKey,
    additional_objects: Snapshot,
}

/// Audit-trail capture engine over a version store
pub struct Auditor<S: VersionStore> {
    store: S,
    registrations: HashMap<String, Registration>,
    types: TypeRegistry,
    caches: HashMap<CacheKey, CaptureCache>,
    in_flight: Vec<InFlightVersion>,
    latest_versions_limit: usize,
}

impl Auditor<SqliteVersionStore> {
    /// Open the configured SQLite store, applying migrations
    ///
    /// # Errors
    ///
    /// Returns `ERR_PERSISTENCE` if the database cannot be opened or migrated.
    pub fn open(config: &AuditConfig) -> Result<Self, ExError> {
        let store = SqliteVersionStore::open(&config.database_path)?;
        Ok(Self::new(store).with_latest_versions_limit(config.latest_versions_limit))
    }
}

impl<S: VersionStore> Auditor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            registrations: HashMap::new(),
            types: TypeRegistry::new(),
            caches: HashMap::new(),
            in_flight: Vec::new(),
            latest_versions_limit: DEFAULT_LATEST_VERSIONS_LIMIT,
        }
    }

    pub fn with_latest_versions_limit(mut self, limit: usize) -> Self {
        self.latest_versions_limit = limit;
        self
    }

    /// Opt a type into tracking, replacing any earlier registration
    pub fn register(&mut self, item_type: impl Into<String>, options: TrackingOptions) {
        let item_type = item_type.into();
        tracing::debug!(item_type = %item_type, "Registered tracked type");
        self.registrations
            .insert(item_type.clone(), Registration::new(item_type, options));
    }

    /// Declare a type schema used to materialize stored snapshots
    pub fn register_type(&mut self, schema: TypeSchema) {
        self.types.register(schema);
    }

    pub fn registration(&self, item_type: &str) -> Option<&Registration> {
        self.registrations.get(item_type)
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeRegistry {
        &mut self.types
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Staged data for one entity in one transaction
    pub fn pending(&self, txn: TransactionId, entity: &dyn Tracked) -> Option<&CaptureCache> {
        self.caches.get(&CacheKey::new(txn, entity))
    }

    /// Number of caches still waiting for a commit or rollback
    pub fn pending_count(&self) -> usize {
        self.caches.len()
    }

    /// Post-create signal
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors.
    pub fn after_create(
        &mut self,
        ctx: &AuditContext,
        txn: TransactionId,
        entity: &dyn Tracked,
    ) -> Result<(), ExError> {
        let Some(registration) = self.registrations.get(entity.item_type()) else {
            log_untracked(entity);
            return Ok(());
        };
        if !ctx.enabled {
            return Ok(());
        }
        let key = CacheKey::new(txn, entity);
        self.caches
            .entry(key.clone())
            .or_default()
            .record_create(ctx, registration);
        note_in_flight(&mut self.in_flight, key, registration, entity)
            .map_err(|e| hook_error("after_create", e, entity))
    }

    /// Post-update signal with the just-applied `{attr: [old, new]}` changes
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors and store read failures.
    pub fn after_update(
        &mut self,
        ctx: &AuditContext,
        txn: TransactionId,
        entity: &dyn Tracked,
        saved_changes: &Snapshot,
    ) -> Result<(), ExError> {
        let Some(registration) = self.registrations.get(entity.item_type()) else {
            log_untracked(entity);
            return Ok(());
        };
        if !ctx.enabled {
            return Ok(());
        }
        let key = CacheKey::new(txn, entity);
        let previous = resolve_previous(
            &self.store,
            &self.in_flight,
            &key.item_type,
            &key.item_id,
            Some(txn),
        )?;
        self.caches
            .entry(key.clone())
            .or_default()
            .record_update(ctx, registration, entity, saved_changes, previous.as_ref())
            .map_err(|e| hook_error("after_update", e, entity))?;
        note_in_flight(&mut self.in_flight, key, registration, entity)
            .map_err(|e| hook_error("after_update", e, entity))
    }

    /// Pre-destroy signal
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors and store read failures.
    pub fn before_destroy(
        &mut self,
        ctx: &AuditContext,
        txn: TransactionId,
        entity: &dyn Tracked,
    ) -> Result<(), ExError> {
        let Some(registration) = self.registrations.get(entity.item_type()) else {
            log_untracked(entity);
            return Ok(());
        };
        if !ctx.enabled {
            return Ok(());
        }
        let key = CacheKey::new(txn, entity);
        let previous = resolve_previous(
            &self.store,
            &self.in_flight,
            &key.item_type,
            &key.item_id,
            Some(txn),
        )?;
        self.caches
            .entry(key)
            .or_default()
            .record_destroy(ctx, registration, entity, previous.as_ref())
            .map_err(|e| hook_error("before_destroy", e, entity))
    }

    /// Post-commit signal for one entity: write its version if material.
    ///
    /// The entity's cache is removed before writing, so it is gone even when
    /// the write fails.
    ///
    /// # Errors
    ///
    /// Extraction-scheme configuration errors and store failures.
    pub fn after_commit(
        &mut self,
        ctx: &AuditContext,
        txn: TransactionId,
        entity: &dyn Tracked,
    ) -> Result<Option<VersionRecord>, ExError> {
        let key = CacheKey::new(txn, entity);
        let cache = self.caches.remove(&key);
        self.in_flight.retain(|v| v.key != key);

        let Some(mut cache) = cache else {
            return Ok(None);
        };
        let Some(registration) = self.registrations.get(&key.item_type) else {
            return Ok(None);
        };
        let previous = resolve_previous(
            &self.store,
            &self.in_flight,
            &key.item_type,
            &key.item_id,
            Some(txn),
        )?;

        finalize(
            &mut cache,
            entity,
            registration,
            ctx,
            previous.as_ref(),
            &mut self.store,
        )
    }

    /// Abort signal: discard every cache of `txn` without writing.
    ///
    /// Returns the number of discarded caches.
    pub fn after_rollback(&mut self, txn: TransactionId) -> usize {
        let before = self.caches.len();
        self.caches.retain(|key, _| key.txn != txn);
        self.in_flight.retain(|v| v.key.txn != txn);
        let discarded = before - self.caches.len();
        tracing::debug!(txn_id = %txn, discarded, "Transaction rolled back");
        discarded
    }

    /// Previous version's additional objects, persisted-first then in-flight
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn previous_additional_objects(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Option<Snapshot>, ExError> {
        resolve_previous(&self.store, &self.in_flight, item_type, item_id, None)
    }

    /// Fresh additional objects of `entity` diffed against its previous version
    ///
    /// # Errors
    ///
    /// Returns `ERR_NOT_FOUND` for an unregistered type, otherwise
    /// extraction-scheme and store errors.
    pub fn additional_objects_snapshot_changes(
        &self,
        entity: &dyn Tracked,
    ) -> Result<Snapshot, ExError> {
        let registration = self.registrations.get(entity.item_type()).ok_or_else(|| {
            ExError::new(auditrail_core::ExErrorKind::NotFound)
                .with_op("additional_objects_snapshot_changes")
                .with_item_type(entity.item_type())
                .with_message("Type is not registered for tracking")
        })?;
        let current = registration
            .additional_objects_snapshot(entity)
            .map_err(|e| hook_error("additional_objects_snapshot_changes", e, entity))?;
        let previous = self.previous_additional_objects(entity.item_type(), &entity.item_id())?;
        Ok(previous.unwrap_or_default().diff(&current))
    }

    /// The `n` most recent versions of one entity, newest first
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn latest_versions(
        &self,
        item_type: &str,
        item_id: &str,
        n: usize,
    ) -> Result<Vec<VersionRecord>, ExError> {
        self.store
            .query_versions(&VersionQuery::for_item(item_type, item_id).limit(n))
    }

    /// [`Auditor::latest_versions`] with the configured limit
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn recent_versions(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Vec<VersionRecord>, ExError> {
        self.latest_versions(item_type, item_id, self.latest_versions_limit)
    }

    /// Full history of one entity, oldest first
    ///
    /// # Errors
    ///
    /// Propagates store read failures.
    pub fn versions_for(
        &self,
        item_type: &str,
        item_id: &str,
    ) -> Result<Vec<VersionRecord>, ExError> {
        self.store.query_versions(
            &VersionQuery::for_item(item_type, item_id).order(SortOrder::OldestFirst),
        )
    }
}

fn resolve_previous<S: VersionStore>(
    store: &S,
    in_flight: &[InFlightVersion],
    item_type: &str,
    item_id: &str,
    exclude_txn: Option<TransactionId>,
) -> Result<Option<Snapshot>, ExError> {
    if let Some(version) = store.latest_version(item_type, item_id)? {
        return Ok(Some(version.additional_objects));
    }
    Ok(in_flight
        .iter()
        .rev()
        .find(|v| {
            v.key.item_type == item_type
                && v.key.item_id == item_id
                && Some(v.key.txn) != exclude_txn
        })
        .map(|v| v.additional_objects.clone()))
}

fn note_in_flight(
    in_flight: &mut Vec<InFlightVersion>,
    key: CacheKey,
    registration: &Registration,
    entity: &dyn Tracked,
) -> Result<(), AuditError> {
    if !registration.has_schemes() {
        return Ok(());
    }
    let additional_objects = registration.additional_objects_snapshot(entity)?;
    in_flight.retain(|v| v.key != key);
    in_flight.push(InFlightVersion {
        key,
        additional_objects,
    });
    Ok(())
}

fn log_untracked(entity: &dyn Tracked) {
    tracing::debug!(item_type = %entity.item_type(), "Type not tracked, hook ignored");
}

fn hook_error(op: &str, err: AuditError, entity: &dyn Tracked) -> ExError {
    ExError::from(err)
        .with_op(op)
        .with_item_type(entity.item_type())
        .with_item_id(entity.item_id())
}
