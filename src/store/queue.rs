//! Durable change queue using SQLite.
//!
//! This module provides the database layer that tracks:
//! - Pending index changes (entity type, id, change kind), oldest first
//! - Fake suppression rows for instances a reindex pass decided to skip
//! - The ordered set of entity types awaiting a full reindex
//! - The persisted feature flag
//!
//! Reads and deletes run in separate transactions. A row enqueued between
//! the scan and the delete of a batch is simply picked up by the next
//! batch; index writes are idempotent per entity id.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::types::{ChangeKind, QueueItem};
use crate::config::ShardFilter;

/// SQL schema for the queue database
const SCHEMA_SQL: &str = r#"
-- Pending changes and fake suppression rows
CREATE TABLE IF NOT EXISTS fts_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    change_kind TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,
    fake INTEGER NOT NULL DEFAULT 0,
    indexing_host TEXT
);

-- Batch loading: non-fake rows in enqueue order
CREATE INDEX IF NOT EXISTS idx_fts_queue_order ON fts_queue(fake, enqueued_at, id);

-- "Already queued" lookups during reindex scans
CREATE INDEX IF NOT EXISTS idx_fts_queue_entity ON fts_queue(entity_type, entity_id);

-- Entity types awaiting a full reindex, FIFO by position
CREATE TABLE IF NOT EXISTS fts_reindex_queue (
    entity_type TEXT PRIMARY KEY,
    position INTEGER NOT NULL,
    -- Last instance id handed out by a batched scan
    scan_cursor TEXT
);

CREATE TABLE IF NOT EXISTS fts_settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const ENABLED_KEY: &str = "enabled";

/// Bound on bound parameters per `IN (...)` lookup
const LOOKUP_CHUNK_SIZE: usize = 500;

type QueueRow = (i64, String, String, String, i64, bool, Option<String>);

/// Errors raised by the queue database
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to prepare queue database location: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt queue row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

/// Everything one reindex activation writes, committed together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexBatchPlan {
    pub entity_type: String,
    /// Instances to enqueue as INSERT
    pub enqueue: Vec<Uuid>,
    /// Instances to record as fake suppression rows
    pub suppress: Vec<Uuid>,
    /// Remove the entity type from the pending-reindex set
    pub retire: bool,
    /// Drop the fake rows of the entity type (only meaningful with `retire`)
    pub clear_suppressed: bool,
    /// Where the next scan of a type that stays pending resumes
    pub cursor: Option<Uuid>,
}

/// Persistent queue of index changes.
///
/// Uses SQLite with WAL mode so producers can enqueue while a batch is
/// being drained.
#[derive(Clone)]
pub struct QueueStore {
    pool: SqlitePool,
    /// Producers write one row per host; empty means a single host-less row
    indexing_hosts: Arc<[String]>,
}

impl QueueStore {
    /// Open existing queue database or create a new one
    pub async fn open(db_path: &Path, indexing_hosts: &[String]) -> Result<Self, QueueError> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        // Idempotent - CREATE IF NOT EXISTS
        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            indexing_hosts: indexing_hosts.iter().cloned().collect(),
        })
    }

    /// Enqueue a change for one entity instance
    pub async fn enqueue(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        kind: ChangeKind,
    ) -> Result<(), QueueError> {
        self.enqueue_many(entity_type, &[entity_id], kind).await
    }

    /// Enqueue the same change for many instances in one transaction
    pub async fn enqueue_many(
        &self,
        entity_type: &str,
        entity_ids: &[Uuid],
        kind: ChangeKind,
    ) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;
        self.insert_changes(&mut tx, entity_type, entity_ids, kind)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Record an instance as excluded from the running reindex pass
    pub async fn enqueue_fake(&self, entity_type: &str, entity_id: Uuid) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;
        insert_fakes(&mut tx, entity_type, &[entity_id]).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove every row (real and fake) of an entity type
    pub async fn empty_queue(&self, entity_type: &str) -> Result<u64, QueueError> {
        let result = sqlx::query("DELETE FROM fts_queue WHERE entity_type = ?")
            .bind(entity_type)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Remove the fake suppression rows of an entity type
    pub async fn empty_fake_queue(&self, entity_type: &str) -> Result<u64, QueueError> {
        let result = sqlx::query("DELETE FROM fts_queue WHERE entity_type = ? AND fake = 1")
            .bind(entity_type)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Load up to `max` pending changes visible to `shard`, oldest first.
    ///
    /// Rows that cannot be decoded are logged, deleted and left out of the
    /// batch; they can never be applied.
    pub async fn load_batch(
        &self,
        shard: &ShardFilter,
        max: usize,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let limit = i64::try_from(max).unwrap_or(i64::MAX);

        let rows: Vec<QueueRow> = match shard {
            ShardFilter::Unpartitioned => {
                sqlx::query_as(
                    r#"
                    SELECT id, entity_type, entity_id, change_kind, enqueued_at, fake, indexing_host
                    FROM fts_queue
                    WHERE fake = 0 AND indexing_host IS NULL
                    ORDER BY enqueued_at, id
                    LIMIT ?
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            ShardFilter::Host(host) => {
                sqlx::query_as(
                    r#"
                    SELECT id, entity_type, entity_id, change_kind, enqueued_at, fake, indexing_host
                    FROM fts_queue
                    WHERE fake = 0 AND indexing_host = ?
                    ORDER BY enqueued_at, id
                    LIMIT ?
                    "#,
                )
                .bind(host)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut items = Vec::with_capacity(rows.len());
        let mut corrupt = Vec::new();
        for row in rows {
            let id = row.0;
            match decode_row(row) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::error!(queue_id = id, error = %e, "Dropping corrupt queue row");
                    corrupt.push(id);
                }
            }
        }

        if !corrupt.is_empty() {
            self.delete_items(&corrupt, LOOKUP_CHUNK_SIZE).await?;
        }
        Ok(items)
    }

    /// The subset of `candidates` that has a row (real or fake) queued for
    /// `entity_type`. Cost is bounded by the number of candidates, not by
    /// the size of the queue.
    pub async fn queued_among(
        &self,
        entity_type: &str,
        candidates: &[Uuid],
    ) -> Result<HashSet<Uuid>, QueueError> {
        let mut queued = HashSet::new();

        for chunk in candidates.chunks(LOOKUP_CHUNK_SIZE) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let query_str = format!(
                "SELECT DISTINCT entity_id FROM fts_queue WHERE entity_type = ? AND entity_id IN ({})",
                placeholders.join(", ")
            );

            let mut query = sqlx::query_as::<sqlx::Sqlite, (String,)>(&query_str).bind(entity_type);
            for id in chunk {
                query = query.bind(id.to_string());
            }

            let rows = query.fetch_all(&self.pool).await?;
            queued.extend(rows.iter().filter_map(|(raw,)| Uuid::parse_str(raw).ok()));
        }
        Ok(queued)
    }

    /// Ids of an entity type present in the queue, fake rows included
    pub async fn queued_ids(&self, entity_type: &str) -> Result<HashSet<Uuid>, QueueError> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, entity_id FROM fts_queue WHERE entity_type = ?")
                .bind(entity_type)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(id, entity_id)| parse_uuid(id, &entity_id))
            .collect()
    }

    /// Delete queue rows by id, `chunk_size` ids per statement.
    ///
    /// All statements share one transaction. Returns the number of
    /// statements issued.
    pub async fn delete_items(&self, ids: &[i64], chunk_size: usize) -> Result<usize, QueueError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut statements = 0;

        for chunk in ids.chunks(chunk_size.max(1)) {
            let placeholders: Vec<&str> = chunk.iter().map(|_| "?").collect();
            let query_str = format!(
                "DELETE FROM fts_queue WHERE id IN ({})",
                placeholders.join(", ")
            );

            let mut query = sqlx::query(&query_str);
            for id in chunk {
                query = query.bind(*id);
            }
            query.execute(&mut *tx).await?;
            statements += 1;
        }

        tx.commit().await?;
        Ok(statements)
    }

    /// Number of non-fake rows across all hosts
    pub async fn pending_count(&self) -> Result<i64, QueueError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fts_queue WHERE fake = 0")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Number of fake suppression rows of an entity type
    pub async fn fake_count(&self, entity_type: &str) -> Result<i64, QueueError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM fts_queue WHERE entity_type = ? AND fake = 1")
                .bind(entity_type)
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    /// Replace every queue row of an entity type with INSERT changes for
    /// `entity_ids`, in one transaction
    pub async fn replace_queue(
        &self,
        entity_type: &str,
        entity_ids: &[Uuid],
    ) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM fts_queue WHERE entity_type = ?")
            .bind(entity_type)
            .execute(&mut *tx)
            .await?;
        self.insert_changes(&mut tx, entity_type, entity_ids, ChangeKind::Insert)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Empty the queue of an entity type and append it to the pending-reindex
    /// set, atomically. An entity type already pending keeps its position.
    pub async fn schedule_reindex(&self, entity_type: &str) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM fts_queue WHERE entity_type = ?")
            .bind(entity_type)
            .execute(&mut *tx)
            .await?;

        // A type already pending keeps its position but restarts its scan
        sqlx::query(
            r#"
            INSERT INTO fts_reindex_queue (entity_type, position, scan_cursor)
            SELECT ?, COALESCE(MAX(position), 0) + 1, NULL FROM fts_reindex_queue WHERE 1
            ON CONFLICT(entity_type) DO UPDATE SET scan_cursor = NULL
            "#,
        )
        .bind(entity_type)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Entity type at the head of the pending-reindex set
    pub async fn reindex_head(&self) -> Result<Option<String>, QueueError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT entity_type FROM fts_reindex_queue ORDER BY position LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(entity_type,)| entity_type))
    }

    /// Where the next batched scan of a pending entity type resumes.
    /// `None` means from the first instance.
    pub async fn reindex_cursor(&self, entity_type: &str) -> Result<Option<Uuid>, QueueError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT scan_cursor FROM fts_reindex_queue WHERE entity_type = ?")
                .bind(entity_type)
                .fetch_optional(&self.pool)
                .await?;

        let Some(raw) = row.and_then(|(cursor,)| cursor) else {
            return Ok(None);
        };
        match Uuid::parse_str(&raw) {
            Ok(cursor) => Ok(Some(cursor)),
            Err(e) => {
                // Rescanning is safe: queued instances are filtered out again
                tracing::warn!(
                    entity_type = %entity_type,
                    cursor = %raw,
                    error = %e,
                    "Invalid reindex cursor, restarting scan"
                );
                Ok(None)
            }
        }
    }

    /// The whole pending-reindex set in FIFO order
    pub async fn reindex_entities(&self) -> Result<Vec<String>, QueueError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT entity_type FROM fts_reindex_queue ORDER BY position")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(entity_type,)| entity_type).collect())
    }

    pub async fn reindex_is_empty(&self) -> Result<bool, QueueError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fts_reindex_queue")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0 == 0)
    }

    /// Commit one reindex activation: enqueued changes, suppression rows and
    /// the retirement decision land together or not at all.
    pub async fn apply_reindex_batch(&self, plan: &ReindexBatchPlan) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        self.insert_changes(&mut tx, &plan.entity_type, &plan.enqueue, ChangeKind::Insert)
            .await?;
        insert_fakes(&mut tx, &plan.entity_type, &plan.suppress).await?;

        if plan.retire {
            sqlx::query("DELETE FROM fts_reindex_queue WHERE entity_type = ?")
                .bind(&plan.entity_type)
                .execute(&mut *tx)
                .await?;

            if plan.clear_suppressed {
                sqlx::query("DELETE FROM fts_queue WHERE entity_type = ? AND fake = 1")
                    .bind(&plan.entity_type)
                    .execute(&mut *tx)
                    .await?;
            }
        } else if let Some(cursor) = plan.cursor {
            sqlx::query("UPDATE fts_reindex_queue SET scan_cursor = ? WHERE entity_type = ?")
                .bind(cursor.to_string())
                .bind(&plan.entity_type)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Persisted feature flag, if it was ever stored
    pub async fn enabled_flag(&self) -> Result<Option<bool>, QueueError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM fts_settings WHERE key = ?")
            .bind(ENABLED_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value == "true"))
    }

    pub async fn set_enabled_flag(&self, enabled: bool) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            INSERT INTO fts_settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(ENABLED_KEY)
        .bind(if enabled { "true" } else { "false" })
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_changes(
        &self,
        conn: &mut SqliteConnection,
        entity_type: &str,
        entity_ids: &[Uuid],
        kind: ChangeKind,
    ) -> Result<(), QueueError> {
        let enqueued_at = Utc::now().timestamp_micros();
        let hosts: Vec<Option<&str>> = if self.indexing_hosts.is_empty() {
            vec![None]
        } else {
            self.indexing_hosts.iter().map(|h| Some(h.as_str())).collect()
        };

        for entity_id in entity_ids {
            let entity_id = entity_id.to_string();
            for host in &hosts {
                sqlx::query(
                    r#"
                    INSERT INTO fts_queue (entity_type, entity_id, change_kind, enqueued_at, fake, indexing_host)
                    VALUES (?, ?, ?, ?, 0, ?)
                    "#,
                )
                .bind(entity_type)
                .bind(&entity_id)
                .bind(kind.as_str())
                .bind(enqueued_at)
                .bind(*host)
                .execute(&mut *conn)
                .await?;
            }
        }
        Ok(())
    }
}

async fn insert_fakes(
    conn: &mut SqliteConnection,
    entity_type: &str,
    entity_ids: &[Uuid],
) -> Result<(), QueueError> {
    let enqueued_at = Utc::now().timestamp_micros();
    for entity_id in entity_ids {
        sqlx::query(
            r#"
            INSERT INTO fts_queue (entity_type, entity_id, change_kind, enqueued_at, fake, indexing_host)
            VALUES (?, ?, ?, ?, 1, NULL)
            "#,
        )
        .bind(entity_type)
        .bind(entity_id.to_string())
        .bind(ChangeKind::Insert.as_str())
        .bind(enqueued_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

fn parse_uuid(id: i64, raw: &str) -> Result<Uuid, QueueError> {
    Uuid::parse_str(raw).map_err(|e| QueueError::CorruptRow {
        id,
        reason: format!("invalid entity id '{raw}': {e}"),
    })
}

fn decode_row(row: QueueRow) -> Result<QueueItem, QueueError> {
    let (id, entity_type, entity_id, change_kind, enqueued_at, fake, indexing_host) = row;

    let entity_id = parse_uuid(id, &entity_id)?;
    let change_kind = change_kind
        .parse::<ChangeKind>()
        .map_err(|reason| QueueError::CorruptRow { id, reason })?;
    let enqueued_at: DateTime<Utc> =
        DateTime::from_timestamp_micros(enqueued_at).ok_or_else(|| QueueError::CorruptRow {
            id,
            reason: format!("timestamp {enqueued_at} out of range"),
        })?;

    Ok(QueueItem {
        id,
        entity_type,
        entity_id,
        change_kind,
        enqueued_at,
        fake,
        indexing_host,
    })
}
