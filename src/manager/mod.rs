//! FTS manager: the entry points driven by the scheduler and by operators
//!
//! `process_queue` is the only writer of the index during normal operation;
//! `reindex_next_batch` only fills the durable queue. The two run under
//! independent try-once locks, so a slow reindex scan never holds up queue
//! draining and vice versa.

mod maintenance;
mod processor;
mod reindex;

pub use maintenance::{STATUS_DISABLED, STATUS_DONE};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{FtsConfig, ShardFilter};
use crate::errors::FtsResult;
use crate::lock::IndexingLocks;
use crate::schema::{DescriptorRegistry, SchemaProvider, SearchabilityEvaluator};
use crate::search::{
    ContentLoader, DocumentIndexer, IndexBackend, IndexOpener, IndexResource, TantivyOpener,
};
use crate::store::{EntitySnapshot, EntityStore, QueueStore};

/// External collaborators of the manager
pub struct FtsDependencies {
    pub entity_store: Arc<dyn EntityStore>,
    pub schema: Arc<dyn SchemaProvider>,
    /// Defaults to a tantivy index configured from `FtsConfig`
    pub index_opener: Option<Arc<dyn IndexOpener>>,
    /// Required only when descriptors declare content properties
    pub content_loader: Option<Arc<dyn ContentLoader>>,
}

impl FtsDependencies {
    #[must_use]
    pub fn new(entity_store: Arc<dyn EntityStore>, schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            entity_store,
            schema,
            index_opener: None,
            content_loader: None,
        }
    }

    #[must_use]
    pub fn with_index_opener(mut self, opener: Arc<dyn IndexOpener>) -> Self {
        self.index_opener = Some(opener);
        self
    }

    #[must_use]
    pub fn with_content_loader(mut self, loader: Arc<dyn ContentLoader>) -> Self {
        self.content_loader = Some(loader);
        self
    }
}

pub struct FtsManager {
    config: FtsConfig,
    shard: ShardFilter,
    enabled: AtomicBool,
    locks: IndexingLocks,
    queue: QueueStore,
    entity_store: Arc<dyn EntityStore>,
    registry: DescriptorRegistry,
    index: IndexResource,
    indexer: DocumentIndexer,
}

impl FtsManager {
    /// Open the queue database and wire the collaborators.
    ///
    /// The index resource is not touched until the first operation that
    /// needs it.
    pub async fn open(config: FtsConfig, deps: FtsDependencies) -> FtsResult<Self> {
        let queue = QueueStore::open(&config.queue_db_path(), config.indexing_hosts()).await?;

        let enabled = match queue.enabled_flag().await? {
            Some(enabled) => enabled,
            None => {
                queue.set_enabled_flag(config.enabled()).await?;
                config.enabled()
            }
        };

        let opener: Arc<dyn IndexOpener> = match deps.index_opener {
            Some(opener) => opener,
            None => Arc::new(TantivyOpener::new(
                config.store_content_in_index(),
                config.writer_memory_limit(),
            )),
        };
        let shard = config.shard();

        tracing::info!(
            enabled,
            index_dir = %config.index_dir().display(),
            queue_db = %config.queue_db_path().display(),
            shard = ?shard,
            "FTS manager opened"
        );

        Ok(Self {
            index: IndexResource::new(config.index_dir(), opener),
            indexer: DocumentIndexer::new(Arc::clone(&deps.entity_store), deps.content_loader),
            registry: DescriptorRegistry::new(deps.schema),
            entity_store: deps.entity_store,
            enabled: AtomicBool::new(enabled),
            locks: IndexingLocks::new(),
            shard,
            queue,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &FtsConfig {
        &self.config
    }

    /// Durable queue, for producers recording entity changes
    #[must_use]
    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Switch the feature on or off; the flag survives restarts
    pub async fn set_enabled(&self, enabled: bool) -> FtsResult<()> {
        self.queue.set_enabled_flag(enabled).await?;
        self.enabled.store(enabled, Ordering::Release);
        tracing::info!(enabled, "FTS enabled flag changed");
        Ok(())
    }

    /// Whether an index-mutating operation is running
    #[must_use]
    pub fn is_writing(&self) -> bool {
        self.locks.write.is_held()
    }

    /// Whether a reindex batch is being populated
    #[must_use]
    pub fn is_reindexing(&self) -> bool {
        self.locks.reindex.is_held()
    }

    /// Entity types waiting for a full reindex, head first
    pub async fn reindex_queue(&self) -> FtsResult<Vec<String>> {
        Ok(self.queue.reindex_entities().await?)
    }

    /// The index handle, opened on first use
    pub async fn index(&self) -> FtsResult<Arc<dyn IndexBackend>> {
        Ok(self.index.handle().await?)
    }

    /// Whether results of the entity type are displayed
    pub async fn show_in_results(&self, entity_type: &str) -> FtsResult<bool> {
        Ok(self
            .registry
            .get(entity_type)
            .await?
            .is_some_and(|descr| descr.show()))
    }

    /// Entities to enqueue after `entity` changed `dirty_fields`
    pub async fn searchable_entities<S: AsRef<str>>(
        &self,
        entity: &EntitySnapshot,
        dirty_fields: &[S],
    ) -> FtsResult<Vec<EntitySnapshot>> {
        let Some(descr) = self.registry.get(&entity.entity_type).await? else {
            return Ok(Vec::new());
        };
        Ok(SearchabilityEvaluator::new(&descr).searchable_entities(entity, dirty_fields))
    }

    /// Close the queue database
    pub async fn close(&self) {
        self.queue.close().await;
    }
}
