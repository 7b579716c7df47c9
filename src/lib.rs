//! Full-text indexing pipeline
//!
//! Keeps a tantivy index consistent with an entity store by draining a
//! durable SQLite change queue (`FtsManager::process_queue`) and by
//! populating that queue batch by batch when whole entity types need to
//! be reindexed (`FtsManager::reindex_next_batch`). Both entry points are
//! meant to be called periodically by an external scheduler.

pub mod config;
pub mod errors;
pub mod lock;
pub mod manager;
pub mod schema;
pub mod search;
pub mod store;
pub mod utils;

pub use config::{FtsConfig, FtsConfigBuilder, ShardFilter};
pub use errors::{FtsError, FtsResult};
pub use lock::{IndexingLock, IndexingLocks, LockPermit};
pub use manager::{FtsDependencies, FtsManager, STATUS_DISABLED, STATUS_DONE};
pub use schema::{
    DescriptorRegistry, EntityDescr, SchemaError, SchemaProvider, SearchabilityEvaluator,
    StaticSchemaProvider,
};
pub use search::{
    ContentLoader, DocumentIndexer, EntityDocument, FsContentLoader, IndexBackend, IndexError,
    IndexOpener, IndexResource, IndexResult, ItemFailure, TantivyIndex, TantivyOpener,
};
pub use store::{
    ChangeKind, EntitySnapshot, EntityStore, MemoryEntityStore, QueueError, QueueItem, QueueStore,
    ReindexBatchPlan, StoreError,
};
