//! Type-safe builder for `FtsConfig` using the typestate pattern
//!
//! `build()` only exists once the data directory has been provided, so a
//! configuration without a home for the index and the queue cannot be
//! constructed.

use anyhow::Result;
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::FtsConfig;
use crate::utils::{
    DEFAULT_DELETE_CHUNK_SIZE, DEFAULT_INDEXING_BATCH_SIZE, DEFAULT_REINDEX_BATCH_SIZE,
    DEFAULT_WRITER_MEMORY_LIMIT,
};

// Type states for the builder
pub struct WithDataDir;

pub struct FtsConfigBuilder<State = ()> {
    pub(crate) data_dir: Option<PathBuf>,
    pub(crate) enabled: bool,
    pub(crate) index_dir: Option<PathBuf>,
    pub(crate) queue_db_path: Option<PathBuf>,
    pub(crate) indexing_batch_size: usize,
    pub(crate) reindex_batch_size: usize,
    pub(crate) delete_chunk_size: usize,
    pub(crate) indexing_hosts: Vec<String>,
    pub(crate) server_id: Option<String>,
    pub(crate) store_content_in_index: bool,
    pub(crate) writer_memory_limit: usize,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for FtsConfigBuilder<()> {
    fn default() -> Self {
        Self {
            data_dir: None,
            enabled: true,
            index_dir: None,
            queue_db_path: None,
            indexing_batch_size: DEFAULT_INDEXING_BATCH_SIZE,
            reindex_batch_size: DEFAULT_REINDEX_BATCH_SIZE,
            delete_chunk_size: DEFAULT_DELETE_CHUNK_SIZE,
            indexing_hosts: Vec::new(),
            server_id: None,
            store_content_in_index: true,
            writer_memory_limit: DEFAULT_WRITER_MEMORY_LIMIT,
            _phantom: PhantomData,
        }
    }
}

impl FtsConfig {
    /// Create a builder for configuring an `FtsConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> FtsConfigBuilder<()> {
        FtsConfigBuilder::default()
    }
}

impl FtsConfigBuilder<()> {
    pub fn data_dir(self, dir: impl Into<PathBuf>) -> FtsConfigBuilder<WithDataDir> {
        FtsConfigBuilder {
            data_dir: Some(dir.into()),
            enabled: self.enabled,
            index_dir: self.index_dir,
            queue_db_path: self.queue_db_path,
            indexing_batch_size: self.indexing_batch_size,
            reindex_batch_size: self.reindex_batch_size,
            delete_chunk_size: self.delete_chunk_size,
            indexing_hosts: self.indexing_hosts,
            server_id: self.server_id,
            store_content_in_index: self.store_content_in_index,
            writer_memory_limit: self.writer_memory_limit,
            _phantom: PhantomData,
        }
    }
}

impl FtsConfigBuilder<WithDataDir> {
    pub fn build(self) -> Result<FtsConfig> {
        let data_dir = self
            .data_dir
            .ok_or_else(|| anyhow::anyhow!("data_dir is required"))?;

        let config = FtsConfig {
            data_dir,
            enabled: self.enabled,
            index_dir: self.index_dir,
            queue_db_path: self.queue_db_path,
            indexing_batch_size: self.indexing_batch_size,
            reindex_batch_size: self.reindex_batch_size,
            delete_chunk_size: self.delete_chunk_size,
            indexing_hosts: self.indexing_hosts,
            server_id: self.server_id,
            store_content_in_index: self.store_content_in_index,
            writer_memory_limit: self.writer_memory_limit,
        };
        config.validate()?;
        Ok(config)
    }
}
