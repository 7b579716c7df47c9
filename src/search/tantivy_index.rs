//! Tantivy-backed index implementation
//!
//! One long-lived `IndexWriter` per index, guarded by a mutex that is only
//! ever held for synchronous tantivy calls. Readers are reloaded after each
//! commit so counts reflect committed state.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tantivy::collector::Count;
use tantivy::directory::MmapDirectory;
use tantivy::query::TermQuery;
use tantivy::schema::{Field, IndexRecordOption, STORED, STRING, Schema, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use uuid::Uuid;

use super::backend::{EntityDocument, IndexBackend, document_key};
use super::errors::{IndexError, IndexResult};
use super::resource::IndexOpener;
use crate::utils::WRITER_LOCK_FILE_NAME;

/// Fields of the entity index schema
#[derive(Debug, Clone, Copy)]
struct IndexFields {
    pub doc_key: Field,
    pub entity_type: Field,
    pub entity_id: Field,
    pub content: Field,
}

/// Build the entity index schema.
///
/// `doc_key` and `entity_type` are raw terms so documents can be replaced
/// or removed by exact match.
#[must_use]
fn build_schema(store_content: bool) -> (Schema, IndexFields) {
    let mut builder = Schema::builder();
    let doc_key = builder.add_text_field("doc_key", STRING);
    let entity_type = builder.add_text_field("entity_type", STRING | STORED);
    let entity_id = builder.add_text_field("entity_id", STRING | STORED);
    let content = if store_content {
        builder.add_text_field("content", TEXT | STORED)
    } else {
        builder.add_text_field("content", TEXT)
    };

    (
        builder.build(),
        IndexFields {
            doc_key,
            entity_type,
            entity_id,
            content,
        },
    )
}

pub struct TantivyIndex {
    index: Index,
    fields: IndexFields,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
}

impl TantivyIndex {
    /// Open the index in `dir`, creating it when the directory holds none
    pub fn open_in_dir(dir: &Path, store_content: bool, memory_limit: usize) -> IndexResult<Self> {
        let (schema, fields) = build_schema(store_content);
        let directory = MmapDirectory::open(dir).map_err(|e| IndexError::ResourceUnavailable {
            path: dir.to_path_buf(),
            message: e.to_string(),
        })?;
        let index = Index::open_or_create(directory, schema)?;
        Self::from_index(index, fields, memory_limit)
    }

    /// In-memory index, for tools that do not need persistence
    pub fn create_in_ram(store_content: bool, memory_limit: usize) -> IndexResult<Self> {
        let (schema, fields) = build_schema(store_content);
        Self::from_index(Index::create_in_ram(schema), fields, memory_limit)
    }

    fn from_index(index: Index, fields: IndexFields, memory_limit: usize) -> IndexResult<Self> {
        let writer: IndexWriter = index
            .writer_with_num_threads(1, memory_limit)
            .map_err(|e| IndexError::WriterAcquisition(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            fields,
            writer: Mutex::new(writer),
            reader,
        })
    }

    fn commit_and_reload(&self, writer: &mut IndexWriter) -> IndexResult<()> {
        let start = std::time::Instant::now();
        writer
            .commit()
            .map_err(|e| IndexError::CommitFailed(e.to_string()))?;
        self.reader.reload()?;
        tracing::debug!(
            duration_ms = start.elapsed().as_millis(),
            "Index commit and reload completed"
        );
        Ok(())
    }

    /// Merge searchable segments into one. With `rewrite_single` a lone
    /// segment is merged too, which rewrites it in the current format.
    fn merge_segments(&self, rewrite_single: bool) -> IndexResult<usize> {
        let mut writer = self.writer.lock();
        self.commit_and_reload(&mut writer)?;

        let segment_ids = self.index.searchable_segment_ids()?;
        let threshold = if rewrite_single { 1 } else { 2 };
        if segment_ids.len() >= threshold {
            writer.merge(&segment_ids).wait()?;
        }
        self.reader.reload()?;
        Ok(segment_ids.len())
    }
}

impl IndexBackend for TantivyIndex {
    fn upsert(&self, document: &EntityDocument) -> IndexResult<()> {
        let key = document.key();
        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.doc_key, &key);
        doc.add_text(self.fields.entity_type, &document.entity_type);
        doc.add_text(self.fields.entity_id, document.entity_id.to_string());
        doc.add_text(self.fields.content, document.content());

        let writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.doc_key, &key));
        writer
            .add_document(doc)
            .map_err(|e| IndexError::IndexingFailed {
                entity_type: document.entity_type.clone(),
                entity_id: document.entity_id.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn delete(&self, entity_type: &str, entity_id: Uuid) -> IndexResult<()> {
        let key = document_key(entity_type, entity_id);
        self.writer
            .lock()
            .delete_term(Term::from_field_text(self.fields.doc_key, &key));
        Ok(())
    }

    fn delete_entity_type(&self, entity_type: &str) -> IndexResult<()> {
        let mut writer = self.writer.lock();
        writer.delete_term(Term::from_field_text(self.fields.entity_type, entity_type));
        self.commit_and_reload(&mut writer)
    }

    fn delete_all(&self) -> IndexResult<()> {
        let mut writer = self.writer.lock();
        writer.delete_all_documents()?;
        self.commit_and_reload(&mut writer)
    }

    fn commit(&self) -> IndexResult<()> {
        let mut writer = self.writer.lock();
        self.commit_and_reload(&mut writer)
    }

    fn optimize(&self) -> IndexResult<()> {
        let merged = self.merge_segments(false)?;
        tracing::info!(segments = merged, "Index optimized");
        Ok(())
    }

    fn upgrade(&self) -> IndexResult<()> {
        let rewritten = self.merge_segments(true)?;
        tracing::info!(segments = rewritten, "Index segments rewritten");
        Ok(())
    }

    fn document_count(&self, entity_type: Option<&str>) -> IndexResult<u64> {
        let searcher = self.reader.searcher();
        match entity_type {
            None => Ok(searcher.num_docs()),
            Some(entity_type) => {
                let query = TermQuery::new(
                    Term::from_field_text(self.fields.entity_type, entity_type),
                    IndexRecordOption::Basic,
                );
                let count = searcher.search(&query, &Count)?;
                Ok(count as u64)
            }
        }
    }
}

/// Opens `TantivyIndex` instances in an index directory
#[derive(Debug, Clone)]
pub struct TantivyOpener {
    store_content: bool,
    memory_limit: usize,
}

impl TantivyOpener {
    #[must_use]
    pub fn new(store_content: bool, memory_limit: usize) -> Self {
        Self {
            store_content,
            memory_limit,
        }
    }
}

impl IndexOpener for TantivyOpener {
    fn open(&self, location: &Path) -> IndexResult<Arc<dyn IndexBackend>> {
        let index = TantivyIndex::open_in_dir(location, self.store_content, self.memory_limit)?;
        Ok(Arc::new(index))
    }

    fn lock_marker(&self) -> Option<&str> {
        Some(WRITER_LOCK_FILE_NAME)
    }
}
