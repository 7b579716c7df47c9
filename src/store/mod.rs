//! Durable queue and entity store access

pub mod entity;
pub mod memory;
pub mod queue;
pub mod types;

pub use entity::{EntitySnapshot, EntityStore, StoreError};
pub use memory::MemoryEntityStore;
pub use queue::{QueueError, QueueStore, ReindexBatchPlan};
pub use types::{ChangeKind, QueueItem};
