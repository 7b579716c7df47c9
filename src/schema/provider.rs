//! Schema provider seam and the process-lifetime descriptor cache

use ahash::AHashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::descriptor::EntityDescr;

/// Errors raised while loading descriptors
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Failed to load FTS configuration: {0}")]
    Load(String),

    #[error("Entity type '{0}' is described more than once")]
    DuplicateEntity(String),
}

/// Source of indexing descriptors, consulted once per process
pub trait SchemaProvider: Send + Sync {
    fn load_descriptors(&self) -> Result<Vec<EntityDescr>, SchemaError>;
}

/// Schema provider over a fixed list of descriptors
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaProvider {
    descriptors: Vec<EntityDescr>,
}

impl StaticSchemaProvider {
    #[must_use]
    pub fn new(descriptors: Vec<EntityDescr>) -> Self {
        Self { descriptors }
    }
}

impl SchemaProvider for StaticSchemaProvider {
    fn load_descriptors(&self) -> Result<Vec<EntityDescr>, SchemaError> {
        Ok(self.descriptors.clone())
    }
}

/// Immutable name → descriptor map
pub type DescriptorMap = AHashMap<String, Arc<EntityDescr>>;

/// Loads descriptors on first use and keeps them for the process lifetime.
///
/// Schema changes require a restart; there is no invalidation.
pub struct DescriptorRegistry {
    provider: Arc<dyn SchemaProvider>,
    descriptors: OnceCell<Arc<DescriptorMap>>,
}

impl DescriptorRegistry {
    #[must_use]
    pub fn new(provider: Arc<dyn SchemaProvider>) -> Self {
        Self {
            provider,
            descriptors: OnceCell::new(),
        }
    }

    /// All descriptors keyed by entity type name
    pub async fn descriptors(&self) -> Result<Arc<DescriptorMap>, SchemaError> {
        self.descriptors
            .get_or_try_init(|| async {
                let loaded = self.provider.load_descriptors()?;
                let mut map = DescriptorMap::with_capacity(loaded.len());
                for descr in loaded {
                    let name = descr.name().to_string();
                    if map.insert(name.clone(), Arc::new(descr)).is_some() {
                        return Err(SchemaError::DuplicateEntity(name));
                    }
                }
                tracing::debug!(entity_types = map.len(), "FTS descriptors loaded");
                Ok::<_, SchemaError>(Arc::new(map))
            })
            .await
            .cloned()
    }

    pub async fn get(&self, entity_type: &str) -> Result<Option<Arc<EntityDescr>>, SchemaError> {
        Ok(self.descriptors().await?.get(entity_type).cloned())
    }

    /// Described entity type names in ascending order
    pub async fn entity_names(&self) -> Result<Vec<String>, SchemaError> {
        let mut names: Vec<String> = self.descriptors().await?.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        loads: AtomicUsize,
    }

    impl SchemaProvider for CountingProvider {
        fn load_descriptors(&self) -> Result<Vec<EntityDescr>, SchemaError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                EntityDescr::builder("demo$Note").property("title").build(),
                EntityDescr::builder("demo$Task").property("subject").build(),
            ])
        }
    }

    #[tokio::test]
    async fn test_descriptors_are_loaded_once() -> Result<(), SchemaError> {
        let provider = Arc::new(CountingProvider {
            loads: AtomicUsize::new(0),
        });
        let registry = DescriptorRegistry::new(provider.clone());

        assert!(registry.get("demo$Note").await?.is_some());
        assert!(registry.get("demo$Missing").await?.is_none());
        assert_eq!(
            registry.entity_names().await?,
            vec!["demo$Note".to_string(), "demo$Task".to_string()]
        );
        assert_eq!(provider.loads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_descriptor_is_rejected() {
        let registry = DescriptorRegistry::new(Arc::new(StaticSchemaProvider::new(vec![
            EntityDescr::builder("demo$Note").build(),
            EntityDescr::builder("demo$Note").build(),
        ])));

        assert!(matches!(
            registry.descriptors().await,
            Err(SchemaError::DuplicateEntity(name)) if name == "demo$Note"
        ));
    }
}
