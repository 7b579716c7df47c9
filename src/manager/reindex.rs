//! Reindex population: batched (scheduled) and one-shot (administrative)

use uuid::Uuid;

use super::FtsManager;
use crate::errors::{FtsError, FtsResult};
use crate::schema::{EntityDescr, SearchabilityEvaluator};
use crate::store::ReindexBatchPlan;

impl FtsManager {
    /// Fill the queue with the next batch of instances of the entity type
    /// at the head of the reindex set.
    ///
    /// Each activation reads one page of instances after the persisted scan
    /// cursor and only considers those not already queued. Instances
    /// rejected by the searchable-if predicate are recorded as fake rows.
    /// A page shorter than the batch size retires the entity type. Returns
    /// the number of instances considered.
    pub async fn reindex_next_batch(&self) -> FtsResult<usize> {
        if !self.is_enabled() || self.queue.reindex_is_empty().await? {
            return Ok(0);
        }

        let Some(_permit) = self.locks.reindex.try_acquire() else {
            tracing::warn!("Unable to reindex next batch of entities: reindexing at the moment");
            return Ok(0);
        };

        // Re-read under the lock: the previous holder may have retired it
        let Some(entity_type) = self.queue.reindex_head().await? else {
            return Ok(0);
        };
        tracing::debug!(entity_type = %entity_type, "Start reindexing next entities batch");

        let Some(descr) = self.registry.get(&entity_type).await? else {
            tracing::warn!(
                entity_type = %entity_type,
                "No FTS descriptor for entity type, dropping it from the reindex queue"
            );
            self.queue
                .apply_reindex_batch(&ReindexBatchPlan {
                    entity_type,
                    retire: true,
                    clear_suppressed: true,
                    ..Default::default()
                })
                .await?;
            return Ok(0);
        };

        let batch_size = self.config.reindex_batch_size();
        let cursor = self.queue.reindex_cursor(&entity_type).await?;
        let evaluator = SearchabilityEvaluator::new(&descr);

        let mut plan = ReindexBatchPlan {
            entity_type: entity_type.clone(),
            ..Default::default()
        };
        let (scanned, page_len) = if evaluator.has_predicate() {
            let page = self
                .entity_store
                .scan(&entity_type, cursor, Some(batch_size))
                .await?;
            let ids: Vec<Uuid> = page.iter().map(|entity| entity.id).collect();
            let queued = self.queue.queued_among(&entity_type, &ids).await?;

            for entity in page.iter().filter(|entity| !queued.contains(&entity.id)) {
                if evaluator.evaluate(entity) {
                    plan.enqueue.push(entity.id);
                } else {
                    plan.suppress.push(entity.id);
                }
            }
            plan.cursor = ids.last().copied();
            (plan.enqueue.len() + plan.suppress.len(), page.len())
        } else {
            let page = self
                .entity_store
                .scan_ids(&entity_type, cursor, Some(batch_size))
                .await?;
            let queued = self.queue.queued_among(&entity_type, &page).await?;

            plan.enqueue = page
                .iter()
                .copied()
                .filter(|id| !queued.contains(id))
                .collect();
            plan.cursor = page.last().copied();
            (plan.enqueue.len(), page.len())
        };

        plan.retire = page_len < batch_size;
        plan.clear_suppressed = plan.retire && evaluator.has_predicate();
        self.queue.apply_reindex_batch(&plan).await?;

        tracing::debug!(
            entity_type = %entity_type,
            count = scanned,
            enqueued = plan.enqueue.len(),
            suppressed = plan.suppress.len(),
            retired = plan.retire,
            "Reindex batch added to the FTS queue"
        );
        Ok(scanned)
    }

    /// Replace the queued changes of an entity type with an INSERT for
    /// every searchable instance. Returns the number enqueued.
    ///
    /// Does not take the reindex lock; meant for administrative use while
    /// no batched pass runs for the same type.
    pub async fn reindex_entity(&self, entity_type: &str) -> FtsResult<usize> {
        self.ensure_entity_type(entity_type)?;

        let Some(descr) = self.registry.get(entity_type).await? else {
            self.queue.empty_queue(entity_type).await?;
            return Ok(0);
        };

        let ids = self.searchable_ids(&descr).await?;
        self.queue.replace_queue(entity_type, &ids).await?;

        tracing::info!(
            entity_type = %entity_type,
            count = ids.len(),
            "Entity type queued for reindex"
        );
        Ok(ids.len())
    }

    /// `reindex_entity` for every described entity type
    pub async fn reindex_all(&self) -> FtsResult<usize> {
        let mut total = 0;
        for entity_type in self.registry.entity_names().await? {
            total += self.reindex_entity(&entity_type).await?;
        }
        Ok(total)
    }

    /// Schedule an entity type for batched reindex: its queued changes are
    /// dropped and it joins the tail of the reindex set. Scheduling a type
    /// that is already pending keeps its position.
    pub async fn async_reindex_entity(&self, entity_type: &str) -> FtsResult<()> {
        self.ensure_entity_type(entity_type)?;
        if self.registry.get(entity_type).await?.is_none() {
            return Err(FtsError::MissingConfiguration(entity_type.to_string()));
        }

        self.queue.schedule_reindex(entity_type).await?;
        tracing::info!(entity_type = %entity_type, "Entity type scheduled for reindex");
        Ok(())
    }

    /// `async_reindex_entity` for every described entity type
    pub async fn async_reindex_all(&self) -> FtsResult<()> {
        for entity_type in self.registry.entity_names().await? {
            self.async_reindex_entity(&entity_type).await?;
        }
        Ok(())
    }

    fn ensure_entity_type(&self, entity_type: &str) -> FtsResult<()> {
        if self.entity_store.has_entity_type(entity_type) {
            Ok(())
        } else {
            Err(FtsError::InvalidEntityType(entity_type.to_string()))
        }
    }

    async fn searchable_ids(&self, descr: &EntityDescr) -> FtsResult<Vec<Uuid>> {
        let evaluator = SearchabilityEvaluator::new(descr);

        if !evaluator.has_predicate() {
            return Ok(self.entity_store.scan_ids(descr.name(), None, None).await?);
        }

        Ok(self
            .entity_store
            .scan(descr.name(), None, None)
            .await?
            .into_iter()
            .filter(|entity| evaluator.evaluate(entity))
            .map(|entity| entity.id)
            .collect())
    }
}
