//! Full-text index access for the indexing pipeline
//!
//! The pipeline only sees the `IndexBackend` seam. `TantivyIndex` is the
//! shipped implementation; `IndexResource` owns the single process-wide
//! handle, and `DocumentIndexer` turns queued changes into index writes.

pub mod backend;
pub mod content;
pub mod errors;
pub mod indexer;
pub mod resource;
pub mod tantivy_index;

pub use backend::{EntityDocument, IndexBackend, document_key};
pub use content::{ContentError, ContentLoader, FsContentLoader};
pub use errors::{IndexError, IndexResult};
pub use indexer::{DocumentIndexer, ItemFailure, build_document};
pub use resource::{IndexOpener, IndexResource};
pub use tantivy_index::{TantivyIndex, TantivyOpener};
