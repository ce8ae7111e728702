//! Commit-gated version writer.
//!
//! [`finalize`] runs once per entity after its transaction committed. It
//! decides whether the staged change is material and, if so, persists exactly
//! one version. The cache is emptied on every path, including failures.

use crate::capture::{CaptureCache, PendingExtras};
use crate::entity::Tracked;
use crate::errors::ExError;
use crate::registration::Registration;
use crate::snapshot::Snapshot;
use crate::store::VersionStore;
use crate::version::{NewVersion, VersionEvent, VersionRecord};
use crate::{log_op_end, log_op_error, log_op_start};
use auditrail_core_types::AuditContext;
use chrono::Utc;

/// Turn a committed capture into a persisted version.
///
/// `previous_additional_objects` is the previous version's
/// `additional_objects`; it is only consulted for create events, whose extras
/// are computed here rather than by a hook.
///
/// Returns `Ok(None)` when auditing is disabled, no hook fired, or an update
/// changed nothing material. A staged destroy is always written.
///
/// # Errors
/// - Extraction-scheme configuration errors (`ERR_MISSING_*`)
/// - Store failures (`ERR_PERSISTENCE`, `ERR_SERIALIZATION`), not retried
pub fn finalize<S: VersionStore + ?Sized>(
    cache: &mut CaptureCache,
    entity: &dyn Tracked,
    registration: &Registration,
    ctx: &AuditContext,
    previous_additional_objects: Option<&Snapshot>,
    store: &mut S,
) -> Result<Option<VersionRecord>, ExError> {
    let pending = cache.take();
    if !ctx.enabled {
        return Ok(None);
    }
    let Some(event) = pending.pending_event() else {
        return Ok(None);
    };

    let item_id = entity.item_id();
    log_op_start!(
        "finalize_version",
        item = (registration.item_type(), item_id),
        version_event = event.as_str()
    );
    let start = std::time::Instant::now();

    let result = finalize_impl(
        pending,
        event,
        entity,
        registration,
        ctx,
        previous_additional_objects,
        store,
    )
    .map_err(|e| {
        let e = e
            .with_item_type(registration.item_type())
            .with_item_id(item_id.clone())
            .with_request_id(ctx.request_id.clone());
        log_op_error!(
            "finalize_version",
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64
        );
        e
    })?;

    match &result {
        Some(record) => {
            log_op_end!(
                "finalize_version",
                duration_ms = start.elapsed().as_millis() as u64,
                version_id = record.id
            );
        }
        None => {
            tracing::debug!(
                item_type = registration.item_type(),
                item_id = %item_id,
                "No material change, version skipped"
            );
            log_op_end!(
                "finalize_version",
                duration_ms = start.elapsed().as_millis() as u64
            );
        }
    }

    Ok(result)
}

fn finalize_impl<S: VersionStore + ?Sized>(
    pending: CaptureCache,
    event: VersionEvent,
    entity: &dyn Tracked,
    registration: &Registration,
    ctx: &AuditContext,
    previous_additional_objects: Option<&Snapshot>,
    store: &mut S,
) -> Result<Option<VersionRecord>, ExError> {
    let skip = registration.skip_list();
    let with_op = |e: crate::errors::AuditError| ExError::from(e).with_op("finalize_version");

    let (object, changes, extras) = match event {
        VersionEvent::Create => {
            let object = entity.attributes().except(skip);
            let changes = Snapshot::new().diff(&object);
            let current = registration
                .additional_objects_snapshot(entity)
                .map_err(with_op)?;
            let extras = PendingExtras {
                additional_objects_changes: Some(
                    previous_additional_objects
                        .cloned()
                        .unwrap_or_default()
                        .diff(&current),
                ),
                additional_objects: Some(current),
                metadata: pending
                    .pending_extras()
                    .map(|e| e.metadata.clone())
                    .unwrap_or_default(),
            };
            (object, changes, extras)
        }
        VersionEvent::Update => {
            let changes = pending.pending_changes().cloned().unwrap_or_default();
            let object = match pending.pending_object() {
                Some(object) => object.clone(),
                None => entity.attributes().except(skip).revert(&changes),
            };
            let extras = pending.pending_extras().cloned().unwrap_or_default();
            (object, changes, extras)
        }
        VersionEvent::Destroy => {
            let object = match pending.pending_object() {
                Some(object) => object.clone(),
                None => entity.attributes().except(skip),
            };
            let changes = match pending.pending_changes() {
                Some(changes) => changes.clone(),
                None => object.removed(),
            };
            let extras = pending.pending_extras().cloned().unwrap_or_default();
            (object, changes, extras)
        }
    };

    // a destroy is recorded even when every attribute was blank or skipped
    let has_object_change = event == VersionEvent::Destroy || !changes.is_empty();
    let has_extras_change = extras.has_material_change(skip);
    if !has_object_change && !has_extras_change {
        return Ok(None);
    }

    let additional_objects = match extras.additional_objects {
        Some(objects) => objects,
        None => registration
            .additional_objects_snapshot(entity)
            .map_err(with_op)?,
    };

    let mut metadata = ctx.metadata.clone();
    metadata.extend(extras.metadata);

    let version = NewVersion {
        item_type: registration.item_type().to_string(),
        item_id: entity.item_id(),
        event,
        object,
        object_changes: changes,
        additional_objects,
        additional_objects_changes: extras.additional_objects_changes.unwrap_or_default(),
        whodunnit: ctx.actor.clone(),
        metadata,
        created_at: Utc::now(),
    };

    let id = store.create_version(version.clone())?;
    Ok(Some(version.into_record(id)))
}
