//! Top-level error type of the FTS manager

use crate::schema::SchemaError;
use crate::search::IndexError;
use crate::store::{QueueError, StoreError};

pub type FtsResult<T> = Result<T, FtsError>;

#[derive(Debug, thiserror::Error)]
pub enum FtsError {
    /// The entity type name is unknown to the entity store
    #[error("Invalid entity type name: '{0}'")]
    InvalidEntityType(String),

    /// The entity type has no FTS descriptor
    #[error("No FTS configuration for entity type '{0}'")]
    MissingConfiguration(String),

    #[error("Unable to {0}: writing at the moment")]
    WriteInProgress(&'static str),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("Background index task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
