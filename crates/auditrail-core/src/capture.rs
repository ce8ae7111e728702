//! Lifecycle capture cache.
//!
//! One [`CaptureCache`] stages the pending version of one entity within one
//! transaction. The record store's lifecycle hooks fill it; the writer takes
//! it on commit. The event tag is first write wins, so an update followed by
//! a destroy in the same transaction keeps the update's tag while the destroy
//! still populates whatever is still empty. Repeated saves are the exception:
//! each one folds its changes into the cached set, since a transaction may
//! save the same entity several times before its commit is reported.
//!
//! ```text
//! idle ──after_create──▶ create-pending ─┐
//! idle ──after_update──▶ update-pending ─┼──finalize──▶ idle
//! idle ─before_destroy─▶ destroy-pending ┘
//! ```

use crate::entity::Tracked;
use crate::errors::Result;
use crate::registration::Registration;
use crate::snapshot::Snapshot;
use crate::version::VersionEvent;
use auditrail_core_types::AuditContext;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Extraction-scheme output and request metadata staged for a version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingExtras {
    pub additional_objects: Option<Snapshot>,
    pub additional_objects_changes: Option<Snapshot>,
    pub metadata: BTreeMap<String, Value>,
}

impl PendingExtras {
    /// `{additional_objects, additional_objects_changes, <metadata…>}` as one snapshot
    pub fn flatten(&self) -> Snapshot {
        let mut out: Snapshot = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(objects) = &self.additional_objects {
            out.insert("additional_objects", objects.to_value());
        }
        if let Some(changes) = &self.additional_objects_changes {
            out.insert("additional_objects_changes", changes.to_value());
        }
        out
    }

    /// True if anything but skip-listed keys and blank values remains
    pub fn has_material_change(&self, skip: &BTreeSet<String>) -> bool {
        !self.flatten().except(skip).compact().is_empty()
    }
}

/// Pending version data of one entity in one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureCache {
    pending_event: Option<VersionEvent>,
    pending_object: Option<Snapshot>,
    pending_changes: Option<Snapshot>,
    pending_extras: Option<PendingExtras>,
}

impl CaptureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_event(&self) -> Option<VersionEvent> {
        self.pending_event
    }

    pub fn pending_object(&self) -> Option<&Snapshot> {
        self.pending_object.as_ref()
    }

    pub fn pending_changes(&self) -> Option<&Snapshot> {
        self.pending_changes.as_ref()
    }

    pub fn pending_extras(&self) -> Option<&PendingExtras> {
        self.pending_extras.as_ref()
    }

    /// No hook has fired since the last finalize
    pub fn is_idle(&self) -> bool {
        self.pending_event.is_none()
            && self.pending_object.is_none()
            && self.pending_changes.is_none()
            && self.pending_extras.is_none()
    }

    /// Move the pending data out, leaving the cache idle
    pub fn take(&mut self) -> CaptureCache {
        std::mem::take(self)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Post-create hook. The created state is read fresh at finalize time.
    pub fn record_create(&mut self, ctx: &AuditContext, registration: &Registration) {
        if !should_capture(ctx, registration, VersionEvent::Create) {
            return;
        }
        self.pending_event.get_or_insert(VersionEvent::Create);
    }

    /// Post-update hook, called once per save.
    ///
    /// `saved_changes` is the just-applied `{attr: [old, new]}` set;
    /// `previous` is the previous version's additional objects. Changes of
    /// later saves in the same transaction are merged into the cached ones,
    /// and the additional-objects diff always reflects the latest save.
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors.
    pub fn record_update(
        &mut self,
        ctx: &AuditContext,
        registration: &Registration,
        entity: &dyn Tracked,
        saved_changes: &Snapshot,
        previous: Option<&Snapshot>,
    ) -> Result<()> {
        if !should_capture(ctx, registration, VersionEvent::Update) {
            return Ok(());
        }
        self.pending_event.get_or_insert(VersionEvent::Update);

        // a destroy already staged the final state of this transaction
        if self.pending_object.is_some() {
            return Ok(());
        }

        let changes = saved_changes.except(registration.skip_list());
        match self.pending_changes.as_mut() {
            Some(pending) => pending.merge_changes(&changes),
            None if !changes.is_empty() => self.pending_changes = Some(changes),
            None => {}
        }
        if self.pending_changes.as_ref().is_some_and(Snapshot::is_empty) {
            self.pending_changes = None;
        }

        if registration.has_schemes() {
            let current = registration.additional_objects_snapshot(entity)?;
            let extras = self.pending_extras.get_or_insert_with(PendingExtras::default);
            extras.additional_objects_changes =
                Some(previous.cloned().unwrap_or_default().diff(&current));
        }
        Ok(())
    }

    /// Pre-destroy hook: stage the full state about to disappear.
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors.
    pub fn record_destroy(
        &mut self,
        ctx: &AuditContext,
        registration: &Registration,
        entity: &dyn Tracked,
        previous: Option<&Snapshot>,
    ) -> Result<()> {
        if !should_capture(ctx, registration, VersionEvent::Destroy) {
            return Ok(());
        }
        self.pending_event.get_or_insert(VersionEvent::Destroy);

        let object = entity.attributes().except(registration.skip_list());
        if self.pending_changes.is_none() {
            self.pending_changes = Some(object.removed());
        }
        if self.pending_object.is_none() {
            self.pending_object = Some(object);
        }

        let current = registration.additional_objects_snapshot(entity)?;
        let extras = self.pending_extras.get_or_insert_with(PendingExtras::default);
        if extras.additional_objects_changes.is_none() {
            extras.additional_objects_changes =
                Some(previous.cloned().unwrap_or_default().diff(&current));
        }
        if extras.additional_objects.is_none() {
            extras.additional_objects = Some(current);
        }
        for (key, value) in &ctx.metadata {
            extras
                .metadata
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        Ok(())
    }
}

fn should_capture(ctx: &AuditContext, registration: &Registration, event: VersionEvent) -> bool {
    if !ctx.enabled {
        return false;
    }
    if !registration.tracks(event) {
        tracing::debug!(
            item_type = %registration.item_type(),
            version_event = %event,
            "Event not tracked for type"
        );
        return false;
    }
    true
}
