//! Entity snapshots and the transactional entity store seam
//!
//! The entity store owns the application data being indexed. The pipeline
//! only needs ordered, bounded keyset scans, and single-instance loads when
//! a queued change is applied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Errors raised by an entity store implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Entity store query failed: {0}")]
    Query(String),

    #[error("{0}")]
    Other(String),
}

/// Point-in-time copy of one entity instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub entity_type: String,
    pub id: Uuid,
    pub properties: Map<String, Value>,
}

impl EntitySnapshot {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            id,
            properties: Map::new(),
        }
    }

    /// Builder-style property setter
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Look up a property by dotted path (`customer.address.city`).
    ///
    /// Arrays along the path are not traversed; the array itself is
    /// returned when the path ends on it.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.properties.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Transactional entity store consumed by the pipeline.
///
/// Scans return instances in ascending id order, strictly after `after`
/// when it is set, so a batched pass can resume from the last id it saw
/// (`WHERE id > ? ORDER BY id LIMIT ?` in a database-backed store).
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Whether the store knows the entity type at all
    fn has_entity_type(&self, entity_type: &str) -> bool;

    /// Load a single instance; `None` when it no longer exists
    async fn load(&self, entity_type: &str, id: Uuid) -> Result<Option<EntitySnapshot>, StoreError>;

    /// Ids of instances after `after`, at most `limit` of them
    async fn scan_ids(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Full instances after `after`, at most `limit` of them
    async fn scan(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<EntitySnapshot>, StoreError>;
}
