//! Index backend seam
//!
//! The pipeline talks to the text index only through `IndexBackend`. All
//! mutating calls happen while the caller holds the write-exclusion lock,
//! so implementations see a single writer at a time.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::IndexResult;

/// Document derived from one entity instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDocument {
    pub entity_type: String,
    pub entity_id: Uuid,
    /// Searchable text, one entry per property value or content payload
    pub fields: Vec<(String, String)>,
}

impl EntityDocument {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, entity_id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            fields: Vec::new(),
        }
    }

    /// Key identifying the document; writes replace any document with the
    /// same key
    #[must_use]
    pub fn key(&self) -> String {
        document_key(&self.entity_type, self.entity_id)
    }

    /// All field text joined for the full-text field
    #[must_use]
    pub fn content(&self) -> String {
        self.fields
            .iter()
            .map(|(_, text)| text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[inline]
#[must_use]
pub fn document_key(entity_type: &str, entity_id: Uuid) -> String {
    format!("{entity_type}/{entity_id}")
}

/// Text index consumed by the pipeline
pub trait IndexBackend: Send + Sync {
    /// Write a document, replacing the previous one for the same entity
    fn upsert(&self, document: &EntityDocument) -> IndexResult<()>;

    /// Remove the document of one entity; a missing document is not an error
    fn delete(&self, entity_type: &str, entity_id: Uuid) -> IndexResult<()>;

    /// Remove every document of an entity type and commit
    fn delete_entity_type(&self, entity_type: &str) -> IndexResult<()>;

    /// Remove every document and commit
    fn delete_all(&self) -> IndexResult<()>;

    /// Make pending writes durable and visible
    fn commit(&self) -> IndexResult<()>;

    /// Compact the index
    fn optimize(&self) -> IndexResult<()>;

    /// Rewrite the index in the current on-disk format
    fn upgrade(&self) -> IndexResult<()>;

    /// Committed documents, optionally restricted to one entity type
    fn document_count(&self, entity_type: Option<&str>) -> IndexResult<u64>;
}
