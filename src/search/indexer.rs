//! Applying queued changes to the index backend
//!
//! Derives one `EntityDocument` per entity instance from its descriptor and
//! classifies what went wrong when a change cannot be applied cleanly.

use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use super::backend::{EntityDocument, IndexBackend};
use super::content::ContentLoader;
use super::errors::IndexError;
use crate::schema::{EntityDescr, SearchabilityEvaluator};
use crate::store::{EntitySnapshot, EntityStore, QueueItem, StoreError};

/// Why a queued change was not applied cleanly
#[derive(Debug, thiserror::Error)]
pub enum ItemFailure {
    /// Referenced content could not be fetched. The document was written
    /// without it.
    #[error("Content of {entity_type}/{entity_id} unavailable ({properties}): {reason}")]
    MissingContent {
        entity_type: String,
        entity_id: Uuid,
        properties: String,
        reason: String,
    },

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ItemFailure {
    /// Recoverable failures resolve the queued item anyway
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ItemFailure::MissingContent { .. })
    }

    /// The index itself is unusable, so later items of the batch would
    /// fail the same way
    #[must_use]
    pub fn is_resource_failure(&self) -> bool {
        matches!(self, ItemFailure::Index(e) if e.is_resource_failure())
    }
}

/// Turns queue items into index writes
pub struct DocumentIndexer {
    store: Arc<dyn EntityStore>,
    content: Option<Arc<dyn ContentLoader>>,
}

impl DocumentIndexer {
    #[must_use]
    pub fn new(store: Arc<dyn EntityStore>, content: Option<Arc<dyn ContentLoader>>) -> Self {
        Self { store, content }
    }

    /// Apply one queued change.
    ///
    /// Changes of entity types without a descriptor are skipped. An insert
    /// or update of an instance that no longer exists, or no longer passes
    /// its searchable-if predicate, removes its document.
    pub async fn apply(
        &self,
        backend: &dyn IndexBackend,
        descr: Option<&EntityDescr>,
        item: &QueueItem,
    ) -> Result<(), ItemFailure> {
        let Some(descr) = descr else {
            tracing::warn!(
                entity_type = %item.entity_type,
                entity_id = %item.entity_id,
                "No FTS descriptor for entity type, skipping queued change"
            );
            return Ok(());
        };

        if !item.change_kind.writes_document() {
            backend.delete(&item.entity_type, item.entity_id)?;
            return Ok(());
        }

        let entity = self.store.load(&item.entity_type, item.entity_id).await?;
        match entity {
            Some(entity) if SearchabilityEvaluator::new(descr).evaluate(&entity) => {
                self.write(backend, descr, &entity).await
            }
            Some(_) => {
                tracing::trace!(
                    entity_type = %item.entity_type,
                    entity_id = %item.entity_id,
                    "Instance no longer searchable, removing document"
                );
                backend.delete(&item.entity_type, item.entity_id)?;
                Ok(())
            }
            None => {
                tracing::debug!(
                    entity_type = %item.entity_type,
                    entity_id = %item.entity_id,
                    change = %item.change_kind,
                    "Queued instance not found, removing document"
                );
                backend.delete(&item.entity_type, item.entity_id)?;
                Ok(())
            }
        }
    }

    async fn write(
        &self,
        backend: &dyn IndexBackend,
        descr: &EntityDescr,
        entity: &EntitySnapshot,
    ) -> Result<(), ItemFailure> {
        let mut document = build_document(descr, entity);
        let mut missing: Vec<(&str, String)> = Vec::new();

        for property in descr.content_properties() {
            let Some(reference) = entity.get_path(property).and_then(Value::as_str) else {
                continue;
            };
            let Some(loader) = &self.content else {
                missing.push((property.as_str(), "no content loader configured".to_string()));
                continue;
            };
            match loader.load(reference).await {
                Ok(text) => document.fields.push((property.clone(), text)),
                Err(e) => missing.push((property.as_str(), e.to_string())),
            }
        }

        backend.upsert(&document)?;

        if missing.is_empty() {
            return Ok(());
        }
        let properties = missing
            .iter()
            .map(|(property, _)| *property)
            .collect::<Vec<_>>()
            .join(", ");
        let reason = missing
            .into_iter()
            .map(|(_, reason)| reason)
            .collect::<Vec<_>>()
            .join("; ");
        Err(ItemFailure::MissingContent {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.id,
            properties,
            reason,
        })
    }
}

/// Document holding the text of every searchable property that is set
#[must_use]
pub fn build_document(descr: &EntityDescr, entity: &EntitySnapshot) -> EntityDocument {
    let mut document = EntityDocument::new(&entity.entity_type, entity.id);
    for property in descr.properties() {
        if let Some(value) = entity.get_path(property) {
            let mut text = String::new();
            flatten_value(value, &mut text);
            if !text.is_empty() {
                document.fields.push((property.clone(), text));
            }
        }
    }
    document
}

fn flatten_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => {}
        Value::String(s) => push_text(out, s),
        Value::Bool(b) => push_text(out, if *b { "true" } else { "false" }),
        Value::Number(n) => push_text(out, &n.to_string()),
        Value::Array(items) => {
            for item in items {
                flatten_value(item, out);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                flatten_value(item, out);
            }
        }
    }
}

fn push_text(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(text);
}
