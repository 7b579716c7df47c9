//! Shared configuration constants for the FTS indexing pipeline
//!
//! Default values used by the configuration builder and the queue
//! processor, kept in one place to avoid magic numbers.

/// Indexing batch size: 300 queue items
///
/// Maximum number of queued changes drained by a single `process_queue`
/// call. Each item costs one entity load and one document write.
pub const DEFAULT_INDEXING_BATCH_SIZE: usize = 300;

/// Reindex batch size: 5000 instances
///
/// Number of instances scanned per `reindex_next_batch` call. A scan
/// returning fewer rows than this retires the entity type.
pub const DEFAULT_REINDEX_BATCH_SIZE: usize = 5000;

/// Number of queue row ids bound into one `DELETE ... WHERE id IN (...)`.
pub const DEFAULT_DELETE_CHUNK_SIZE: usize = 10;

/// Tantivy writer memory budget: 50MB
///
/// The writer runs with a single indexing thread, so the whole budget
/// goes to that thread (tantivy requires at least 15MB per thread).
pub const DEFAULT_WRITER_MEMORY_LIMIT: usize = 50_000_000;

/// Directory name of the index under the data directory
pub const INDEX_DIR_NAME: &str = "ftsindex";

/// File name of the queue database under the data directory
pub const QUEUE_DB_FILE_NAME: &str = "fts_queue.sqlite";

/// Exclusive-writer marker tantivy leaves in the index directory
pub const WRITER_LOCK_FILE_NAME: &str = ".tantivy-writer.lock";
