//! Builder methods available for all states, plus validation and parsing

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use super::builder::FtsConfigBuilder;
use super::types::FtsConfig;

impl<State> FtsConfigBuilder<State> {
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn queue_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.queue_db_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn indexing_batch_size(mut self, size: usize) -> Self {
        self.indexing_batch_size = size;
        self
    }

    #[must_use]
    pub fn reindex_batch_size(mut self, size: usize) -> Self {
        self.reindex_batch_size = size;
        self
    }

    /// Set how many queue ids go into one delete statement
    #[must_use]
    pub fn delete_chunk_size(mut self, size: usize) -> Self {
        self.delete_chunk_size = size;
        self
    }

    /// Partition the queue between the given hosts.
    ///
    /// Producers write one row per host, and each processor drains only
    /// the rows addressed to its own `server_id`.
    #[must_use]
    pub fn indexing_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexing_hosts = hosts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn server_id(mut self, id: impl Into<String>) -> Self {
        self.server_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn store_content_in_index(mut self, store: bool) -> Self {
        self.store_content_in_index = store;
        self
    }

    #[must_use]
    pub fn writer_memory_limit(mut self, bytes: usize) -> Self {
        self.writer_memory_limit = bytes;
        self
    }
}

impl FtsConfig {
    /// Parse a JSON configuration document and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FtsConfig =
            serde_json::from_str(json).context("Failed to parse FTS configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and host partitioning consistency
    pub fn validate(&self) -> Result<()> {
        if self.indexing_batch_size == 0 {
            bail!("indexing_batch_size must be greater than zero");
        }
        if self.reindex_batch_size == 0 {
            bail!("reindex_batch_size must be greater than zero");
        }
        if self.delete_chunk_size == 0 {
            bail!("delete_chunk_size must be greater than zero");
        }
        if !self.indexing_hosts.is_empty() {
            match &self.server_id {
                None => bail!("server_id is required when indexing_hosts are configured"),
                Some(id) if !self.indexing_hosts.iter().any(|h| h == id) => {
                    bail!("server_id '{id}' is not one of the configured indexing_hosts")
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShardFilter;

    #[test]
    fn test_defaults_derive_locations_from_data_dir() -> Result<()> {
        let config = FtsConfig::builder().data_dir("/var/lib/app").build()?;

        assert_eq!(config.index_dir(), PathBuf::from("/var/lib/app/ftsindex"));
        assert_eq!(
            config.queue_db_path(),
            PathBuf::from("/var/lib/app/fts_queue.sqlite")
        );
        assert_eq!(config.delete_chunk_size(), 10);
        assert_eq!(config.shard(), ShardFilter::Unpartitioned);
        Ok(())
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let result = FtsConfig::builder()
            .data_dir("/tmp/fts")
            .reindex_batch_size(0)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_host_partitioning_requires_member_server_id() -> Result<()> {
        let missing = FtsConfig::builder()
            .data_dir("/tmp/fts")
            .indexing_hosts(["node-a", "node-b"])
            .build();
        assert!(missing.is_err());

        let stranger = FtsConfig::builder()
            .data_dir("/tmp/fts")
            .indexing_hosts(["node-a", "node-b"])
            .server_id("node-c")
            .build();
        assert!(stranger.is_err());

        let config = FtsConfig::builder()
            .data_dir("/tmp/fts")
            .indexing_hosts(["node-a", "node-b"])
            .server_id("node-b")
            .build()?;
        assert_eq!(config.shard(), ShardFilter::Host("node-b".to_string()));
        Ok(())
    }

    #[test]
    fn test_from_json_applies_defaults() -> Result<()> {
        let config = FtsConfig::from_json_str(
            r#"{ "data_dir": "/srv/data", "reindex_batch_size": 50 }"#,
        )?;
        assert_eq!(config.reindex_batch_size(), 50);
        assert_eq!(config.indexing_batch_size(), 300);
        assert!(config.enabled());
        assert!(config.store_content_in_index());

        let disabled = FtsConfig::from_json_str(r#"{ "data_dir": "/srv/data", "enabled": false }"#)?;
        assert!(!disabled.enabled());
        assert!(disabled.store_content_in_index());

        assert!(FtsConfig::from_json_str(r#"{ "data_dir": "/srv", "delete_chunk_size": 0 }"#).is_err());
        Ok(())
    }
}
