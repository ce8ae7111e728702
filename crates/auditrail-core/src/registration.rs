//! Per-type tracking registration.
//!
//! A tracked type opts in with [`TrackingOptions`]: which lifecycle events are
//! recorded, which attributes are never recorded, and the "also include"
//! extraction schemes. [`Registration`] derives the effective skip-list from
//! those options once, at registration time.

use crate::entity::Tracked;
use crate::errors::Result;
use crate::scheme::{self, ExtractionScheme};
use crate::snapshot::Snapshot;
use crate::version::VersionEvent;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};

/// Options a tracked type registers with
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackingOptions {
    /// Events to record
    pub on: BTreeSet<VersionEvent>,
    /// Attributes never recorded in `object` / `object_changes`
    pub skip: BTreeSet<String>,
    /// Additional objects travelling with the entity's history
    pub also_include: BTreeMap<String, ExtractionScheme>,
    /// Translatable attributes; their `{attr}_translations` storage is skipped
    pub translated_attrs: BTreeSet<String>,
}

impl Default for TrackingOptions {
    fn default() -> Self {
        Self {
            on: [VersionEvent::Create, VersionEvent::Update, VersionEvent::Destroy]
                .into_iter()
                .collect(),
            skip: BTreeSet::new(),
            also_include: BTreeMap::new(),
            translated_attrs: BTreeSet::new(),
        }
    }
}

impl TrackingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict tracking to the given events
    pub fn only<I: IntoIterator<Item = VersionEvent>>(mut self, events: I) -> Self {
        self.on = events.into_iter().collect();
        self
    }

    pub fn skip(mut self, attribute: impl Into<String>) -> Self {
        self.skip.insert(attribute.into());
        self
    }

    pub fn also_include(mut self, attribute: impl Into<String>, scheme: ExtractionScheme) -> Self {
        self.also_include.insert(attribute.into(), scheme);
        self
    }

    pub fn translated(mut self, attribute: impl Into<String>) -> Self {
        self.translated_attrs.insert(attribute.into());
        self
    }
}

/// A tracked type's registration with its effective skip-list
#[derive(Debug, Clone)]
pub struct Registration {
    item_type: String,
    options: TrackingOptions,
    skip_list: BTreeSet<String>,
}

impl Registration {
    pub fn new(item_type: impl Into<String>, options: TrackingOptions) -> Self {
        let mut skip_list = options.skip.clone();
        skip_list.extend(options.also_include.keys().cloned());
        skip_list.extend(
            options
                .translated_attrs
                .iter()
                .map(|attr| format!("{attr}_translations")),
        );

        Self {
            item_type: item_type.into(),
            options,
            skip_list,
        }
    }

    pub fn item_type(&self) -> &str {
        &self.item_type
    }

    pub fn options(&self) -> &TrackingOptions {
        &self.options
    }

    pub fn tracks(&self, event: VersionEvent) -> bool {
        self.options.on.contains(&event)
    }

    /// Explicit skips, extraction-scheme keys and translation storage names
    pub fn skip_list(&self) -> &BTreeSet<String> {
        &self.skip_list
    }

    pub fn has_schemes(&self) -> bool {
        !self.options.also_include.is_empty()
    }

    /// Current "additional objects" of `entity` under this registration
    ///
    /// # Errors
    ///
    /// Propagates extraction-scheme configuration errors.
    pub fn additional_objects_snapshot(&self, entity: &dyn Tracked) -> Result<Snapshot> {
        scheme::evaluate(entity, &self.options.also_include)
    }
}
