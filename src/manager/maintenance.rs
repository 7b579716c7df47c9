//! Operator-triggered index maintenance
//!
//! Every operation here mutates the index and therefore needs the write
//! lock. Status-returning operations report contention and failures as
//! text; deletes report them as errors.

use super::FtsManager;
use crate::errors::{FtsError, FtsResult};
use crate::search::{IndexBackend, IndexResult};

pub const STATUS_DONE: &str = "Done";
pub const STATUS_DISABLED: &str = "FTS is disabled";

impl FtsManager {
    /// Merge index segments. Returns a status message.
    pub async fn optimize(&self) -> String {
        if !self.is_enabled() {
            return STATUS_DISABLED.to_string();
        }
        self.run_maintenance("optimize", |backend| backend.optimize())
            .await
    }

    /// Rewrite the index in the current on-disk format. Returns a status
    /// message.
    pub async fn upgrade(&self) -> String {
        self.run_maintenance("upgrade", |backend| backend.upgrade())
            .await
    }

    /// Remove every document of one entity type
    pub async fn delete_index_for_entity(&self, entity_type: &str) -> FtsResult<()> {
        let Some(_permit) = self.locks.write.try_acquire() else {
            return Err(FtsError::WriteInProgress("delete index"));
        };

        let owned = entity_type.to_string();
        self.on_index(move |backend| backend.delete_entity_type(&owned))
            .await?;
        tracing::info!(entity_type = %entity_type, "Index deleted for entity type");
        Ok(())
    }

    /// Remove every document
    pub async fn delete_index(&self) -> FtsResult<()> {
        let Some(_permit) = self.locks.write.try_acquire() else {
            return Err(FtsError::WriteInProgress("delete index"));
        };

        self.on_index(|backend| backend.delete_all()).await?;
        tracing::info!("Index deleted");
        Ok(())
    }

    async fn run_maintenance<F>(&self, operation: &'static str, op: F) -> String
    where
        F: FnOnce(&dyn IndexBackend) -> IndexResult<()> + Send + 'static,
    {
        let Some(_permit) = self.locks.write.try_acquire() else {
            return FtsError::WriteInProgress(operation).to_string();
        };

        tracing::debug!(operation, "Start index maintenance");
        match self.on_index(op).await {
            Ok(()) => {
                tracing::info!(operation, "Index maintenance finished");
                STATUS_DONE.to_string()
            }
            Err(e) => {
                tracing::error!(operation, error = %e, "Index maintenance failed");
                format!("{} failed: {e}", capitalize(operation))
            }
        }
    }

    /// Run a blocking index call off the async runtime
    async fn on_index<F>(&self, op: F) -> FtsResult<()>
    where
        F: FnOnce(&dyn IndexBackend) -> IndexResult<()> + Send + 'static,
    {
        let backend = self.index.handle().await?;
        tokio::task::spawn_blocking(move || op(backend.as_ref())).await??;
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
