//! Error types for index operations

use std::path::PathBuf;
use tantivy::TantivyError;
use thiserror::Error;

/// Result type alias for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Error types for index operations
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index location cannot be created or opened. Nothing can be
    /// indexed until this is fixed.
    #[error("Failed to open search index at {path:?}: {message}")]
    ResourceUnavailable { path: PathBuf, message: String },

    /// Index writer acquisition failed
    #[error("Failed to acquire index writer: {0}")]
    WriterAcquisition(String),

    /// Index commit failed
    #[error("Failed to commit index changes: {0}")]
    CommitFailed(String),

    /// Document write or delete failed
    #[error("Indexing failed for {entity_type}/{entity_id}: {message}")]
    IndexingFailed {
        entity_type: String,
        entity_id: String,
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tantivy error wrapper
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Whether the error concerns the index resource as a whole rather than
    /// a single document
    #[must_use]
    pub fn is_resource_failure(&self) -> bool {
        matches!(
            self,
            IndexError::ResourceUnavailable { .. }
                | IndexError::WriterAcquisition(_)
                | IndexError::CommitFailed(_)
        )
    }
}
