//! Core configuration types for the FTS indexing pipeline
//!
//! This module contains the `FtsConfig` struct that carries batch sizes,
//! locations and host partitioning settings for the queue processor and
//! the reindex coordinator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::utils::{
    DEFAULT_DELETE_CHUNK_SIZE, DEFAULT_INDEXING_BATCH_SIZE, DEFAULT_REINDEX_BATCH_SIZE,
    DEFAULT_WRITER_MEMORY_LIMIT,
};

/// Main configuration struct for full-text indexing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtsConfig {
    /// Root data directory. The index and the queue database live under
    /// it unless overridden.
    pub(crate) data_dir: PathBuf,

    /// Initial value of the feature flag.
    ///
    /// Only used the first time a queue database is opened; afterwards the
    /// persisted flag wins.
    #[serde(default = "default_enabled")]
    pub(crate) enabled: bool,

    #[serde(default)]
    pub(crate) index_dir: Option<PathBuf>,
    #[serde(default)]
    pub(crate) queue_db_path: Option<PathBuf>,

    #[serde(default = "default_indexing_batch_size")]
    pub(crate) indexing_batch_size: usize,
    #[serde(default = "default_reindex_batch_size")]
    pub(crate) reindex_batch_size: usize,
    #[serde(default = "default_delete_chunk_size")]
    pub(crate) delete_chunk_size: usize,

    /// Hosts that own a shard of the queue. Empty means the queue is not
    /// partitioned and every processor sees host-less rows.
    #[serde(default)]
    pub(crate) indexing_hosts: Vec<String>,

    /// Identity of this node, matched against `indexing_hosts`
    #[serde(default)]
    pub(crate) server_id: Option<String>,

    /// Store derived document text in the index (not only index it)
    #[serde(default = "default_store_content_in_index")]
    pub(crate) store_content_in_index: bool,

    #[serde(default = "default_writer_memory_limit")]
    pub(crate) writer_memory_limit: usize,
}

/// Which queue rows are visible to this processor instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardFilter {
    /// Only rows written without an indexing host
    Unpartitioned,
    /// Only rows addressed to this host
    Host(String),
}

fn default_enabled() -> bool {
    true
}

fn default_store_content_in_index() -> bool {
    true
}

fn default_indexing_batch_size() -> usize {
    DEFAULT_INDEXING_BATCH_SIZE
}

fn default_reindex_batch_size() -> usize {
    DEFAULT_REINDEX_BATCH_SIZE
}

fn default_delete_chunk_size() -> usize {
    DEFAULT_DELETE_CHUNK_SIZE
}

fn default_writer_memory_limit() -> usize {
    DEFAULT_WRITER_MEMORY_LIMIT
}
