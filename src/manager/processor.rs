//! Draining the durable queue into the index

use std::sync::Arc;

use super::FtsManager;
use crate::errors::FtsResult;

impl FtsManager {
    /// Apply one batch of queued changes to the index.
    ///
    /// Returns the number of changes applied. Nothing happens while the
    /// feature is off, while entity types wait for reindex population, or
    /// while another operation holds the write lock.
    ///
    /// Items that fail only because referenced content is missing leave
    /// the queue without being counted; any other failure keeps the item
    /// queued for the next call. A failure of the index as a whole stops
    /// the batch at that item.
    pub async fn process_queue(&self) -> FtsResult<usize> {
        if !self.is_enabled() {
            return Ok(0);
        }

        if !self.queue.reindex_is_empty().await? {
            tracing::debug!("Unable to process queue: entity types are waiting for reindex");
            return Ok(0);
        }

        let Some(_permit) = self.locks.write.try_acquire() else {
            tracing::warn!("Unable to process queue: writing at the moment");
            return Ok(0);
        };

        let items = self
            .queue
            .load_batch(&self.shard, self.config.indexing_batch_size())
            .await?;
        if items.is_empty() {
            return Ok(0);
        }
        tracing::debug!(batch = items.len(), "Start processing queue");

        let backend = self.index.handle().await?;
        let descriptors = self.registry.descriptors().await?;

        let mut applied = 0;
        let mut resolved = Vec::with_capacity(items.len());
        for item in &items {
            let descr = descriptors.get(item.entity_type.as_str()).map(|d| &**d);
            match self.indexer.apply(backend.as_ref(), descr, item).await {
                Ok(()) => {
                    applied += 1;
                    resolved.push(item.id);
                }
                Err(failure) if failure.is_recoverable() => {
                    tracing::warn!(
                        entity_type = %item.entity_type,
                        entity_id = %item.entity_id,
                        error = %failure,
                        "Indexed without referenced content"
                    );
                    resolved.push(item.id);
                }
                Err(failure) if failure.is_resource_failure() => {
                    tracing::error!(
                        queue_id = item.id,
                        entity_type = %item.entity_type,
                        entity_id = %item.entity_id,
                        error = %failure,
                        "Search index unavailable, leaving the rest of the batch queued"
                    );
                    break;
                }
                Err(failure) => {
                    // Stays queued; retried on every following call
                    tracing::error!(
                        queue_id = item.id,
                        entity_type = %item.entity_type,
                        entity_id = %item.entity_id,
                        change = %item.change_kind,
                        error = %failure,
                        "Failed to index queued change"
                    );
                }
            }
        }

        let committer = Arc::clone(&backend);
        tokio::task::spawn_blocking(move || committer.commit()).await??;

        let statements = self
            .queue
            .delete_items(&resolved, self.config.delete_chunk_size())
            .await?;

        tracing::debug!(
            count = applied,
            removed = resolved.len(),
            retained = items.len() - resolved.len(),
            statements,
            "Queue items processed"
        );
        Ok(applied)
    }
}
