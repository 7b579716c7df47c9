//! Getter methods for `FtsConfig`

use std::path::PathBuf;

use super::types::{FtsConfig, ShardFilter};
use crate::utils::{INDEX_DIR_NAME, QUEUE_DB_FILE_NAME};

impl FtsConfig {
    #[must_use]
    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn index_dir(&self) -> PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join(INDEX_DIR_NAME))
    }

    #[must_use]
    pub fn queue_db_path(&self) -> PathBuf {
        self.queue_db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(QUEUE_DB_FILE_NAME))
    }

    #[must_use]
    pub fn indexing_batch_size(&self) -> usize {
        self.indexing_batch_size
    }

    #[must_use]
    pub fn reindex_batch_size(&self) -> usize {
        self.reindex_batch_size
    }

    #[must_use]
    pub fn delete_chunk_size(&self) -> usize {
        self.delete_chunk_size
    }

    #[must_use]
    pub fn indexing_hosts(&self) -> &[String] {
        &self.indexing_hosts
    }

    #[must_use]
    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    #[must_use]
    pub fn store_content_in_index(&self) -> bool {
        self.store_content_in_index
    }

    #[must_use]
    pub fn writer_memory_limit(&self) -> usize {
        self.writer_memory_limit
    }

    /// Queue partition this node drains.
    ///
    /// Partitioning is in effect only when indexing hosts are configured;
    /// `validate` guarantees `server_id` is set in that case.
    #[must_use]
    pub fn shard(&self) -> ShardFilter {
        match (&self.server_id, self.indexing_hosts.is_empty()) {
            (Some(id), false) => ShardFilter::Host(id.clone()),
            _ => ShardFilter::Unpartitioned,
        }
    }
}
