//! In-process entity store
//!
//! Keeps snapshots in ordered maps. Useful for embedding the pipeline in
//! tools that already hold their data in memory, and for tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use uuid::Uuid;

use super::entity::{EntitySnapshot, EntityStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryEntityStore {
    entities: RwLock<BTreeMap<String, BTreeMap<Uuid, EntitySnapshot>>>,
}

impl MemoryEntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an entity type with no instances yet
    pub fn register_type(&self, entity_type: impl Into<String>) {
        self.entities.write().entry(entity_type.into()).or_default();
    }

    /// Insert or replace an instance
    pub fn put(&self, entity: EntitySnapshot) {
        self.entities
            .write()
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.id, entity);
    }

    pub fn remove(&self, entity_type: &str, id: Uuid) -> Option<EntitySnapshot> {
        self.entities
            .write()
            .get_mut(entity_type)
            .and_then(|instances| instances.remove(&id))
    }

    #[must_use]
    pub fn count(&self, entity_type: &str) -> usize {
        self.entities
            .read()
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    fn collect<T>(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
        map: impl Fn(&EntitySnapshot) -> T,
    ) -> Result<Vec<T>, StoreError> {
        let entities = self.entities.read();
        let instances = entities
            .get(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;

        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(instances
            .range((lower, Bound::Unbounded))
            .map(|(_, entity)| entity)
            .take(limit.unwrap_or(usize::MAX))
            .map(map)
            .collect())
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    fn has_entity_type(&self, entity_type: &str) -> bool {
        self.entities.read().contains_key(entity_type)
    }

    async fn load(&self, entity_type: &str, id: Uuid) -> Result<Option<EntitySnapshot>, StoreError> {
        let entities = self.entities.read();
        let instances = entities
            .get(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))?;
        Ok(instances.get(&id).cloned())
    }

    async fn scan_ids(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.collect(entity_type, after, limit, |entity| entity.id)
    }

    async fn scan(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<EntitySnapshot>, StoreError> {
        self.collect(entity_type, after, limit, Clone::clone)
    }
}
