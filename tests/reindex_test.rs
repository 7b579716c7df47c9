//! Reindex population: retirement, suppression and the manual variants

mod common;

use anyhow::Result;
use common::{harness, harness_with};
use kodegen_tools_fts::{ChangeKind, EntityDescr, EntitySnapshot, EntityStore, FtsError};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

fn note_descr() -> EntityDescr {
    EntityDescr::builder("demo$Note").property("title").build()
}

fn published_only() -> EntityDescr {
    EntityDescr::builder("demo$Article")
        .property("title")
        .searchable_if(|entity: &EntitySnapshot| {
            entity
                .get_path("published")
                .and_then(Value::as_bool)
                .unwrap_or(false)
        })
        .build()
}

#[tokio::test]
async fn test_short_scan_retires_entity_type() -> Result<()> {
    let h = harness_with(vec![note_descr()], |b| b.reindex_batch_size(50)).await?;
    h.seed("demo$Note", 37, |_, e| e.with("title", "x"));

    h.manager.async_reindex_entity("demo$Note").await?;
    assert_eq!(h.manager.reindex_queue().await?, vec!["demo$Note".to_string()]);

    assert_eq!(h.manager.reindex_next_batch().await?, 37);
    assert!(h.manager.reindex_queue().await?.is_empty());

    let queue = h.manager.queue();
    assert_eq!(queue.pending_count().await?, 37);
    let batch = queue
        .load_batch(&h.manager.config().shard(), 100)
        .await?;
    assert!(batch.iter().all(|item| item.change_kind == ChangeKind::Insert));
    Ok(())
}

#[tokio::test]
async fn test_full_scan_keeps_entity_type_at_head() -> Result<()> {
    let h = harness_with(vec![note_descr()], |b| b.reindex_batch_size(50)).await?;
    h.seed("demo$Note", 50, |_, e| e.with("title", "x"));

    h.manager.async_reindex_entity("demo$Note").await?;
    assert_eq!(h.manager.reindex_next_batch().await?, 50);
    assert_eq!(h.manager.reindex_queue().await?, vec!["demo$Note".to_string()]);

    // Everything is queued now, so the next scan comes back empty
    assert_eq!(h.manager.reindex_next_batch().await?, 0);
    assert!(h.manager.reindex_queue().await?.is_empty());
    assert_eq!(h.manager.queue().pending_count().await?, 50);
    Ok(())
}

#[tokio::test]
async fn test_batches_walk_the_whole_entity_type() -> Result<()> {
    let h = harness_with(vec![note_descr()], |b| b.reindex_batch_size(10)).await?;
    h.seed("demo$Note", 25, |_, e| e.with("title", "x"));
    h.manager.async_reindex_entity("demo$Note").await?;

    let mut scans = Vec::new();
    while !h.manager.reindex_queue().await?.is_empty() {
        scans.push(h.manager.reindex_next_batch().await?);
    }
    assert_eq!(scans, vec![10, 10, 5]);

    // Each page resumes after the last id of the previous one
    let sorted = h.store.inner.scan_ids("demo$Note", None, None).await?;
    assert_eq!(
        h.store.scan_cursors(),
        vec![None, Some(sorted[9]), Some(sorted[19])]
    );

    assert_eq!(h.manager.process_queue().await?, 25);
    assert_eq!(h.backend.documents().len(), 25);
    Ok(())
}

#[tokio::test]
async fn test_rejected_instances_are_suppressed_until_retirement() -> Result<()> {
    let h = harness_with(vec![published_only()], |b| b.reindex_batch_size(4)).await?;
    // Alternate drafts and published articles
    h.seed("demo$Article", 6, |n, e| {
        e.with("title", format!("article {n}"))
            .with("published", n % 2 == 0)
    });

    h.manager.async_reindex_entity("demo$Article").await?;
    let queue = h.manager.queue();

    // Count is instances scanned, not matches
    assert_eq!(h.manager.reindex_next_batch().await?, 4);
    let first_fakes = queue.fake_count("demo$Article").await?;
    let first_enqueued = queue.pending_count().await?;
    assert_eq!(first_fakes + first_enqueued, 4);
    assert!(!h.manager.reindex_queue().await?.is_empty());

    // Suppressed instances are not scanned again
    assert_eq!(h.manager.reindex_next_batch().await?, 2);
    assert!(h.manager.reindex_queue().await?.is_empty());

    // Retirement clears the suppression rows
    assert_eq!(queue.fake_count("demo$Article").await?, 0);
    assert_eq!(queue.pending_count().await?, 3);

    assert_eq!(h.manager.process_queue().await?, 3);
    assert_eq!(h.backend.documents().len(), 3);
    Ok(())
}

#[tokio::test]
async fn test_reindex_queue_is_fifo_and_deduplicated() -> Result<()> {
    let h = harness_with(
        vec![note_descr(), published_only()],
        |b| b.reindex_batch_size(100),
    )
    .await?;
    h.seed("demo$Note", 3, |_, e| e.with("title", "x"));
    h.seed("demo$Article", 2, |_, e| e.with("published", true));

    h.manager.async_reindex_entity("demo$Article").await?;
    h.manager.async_reindex_entity("demo$Note").await?;
    h.manager.async_reindex_entity("demo$Article").await?;
    assert_eq!(
        h.manager.reindex_queue().await?,
        vec!["demo$Article".to_string(), "demo$Note".to_string()]
    );

    assert_eq!(h.manager.reindex_next_batch().await?, 2);
    assert_eq!(h.manager.reindex_queue().await?, vec!["demo$Note".to_string()]);
    assert_eq!(h.manager.reindex_next_batch().await?, 3);
    assert!(h.manager.reindex_queue().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_async_reindex_validates_entity_type() -> Result<()> {
    let h = harness(vec![note_descr()]).await?;
    h.store.inner.register_type("demo$Undescribed");

    assert!(matches!(
        h.manager.async_reindex_entity("demo$Nope").await,
        Err(FtsError::InvalidEntityType(name)) if name == "demo$Nope"
    ));
    assert!(matches!(
        h.manager.async_reindex_entity("demo$Undescribed").await,
        Err(FtsError::MissingConfiguration(_))
    ));
    assert!(h.manager.reindex_queue().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_async_reindex_all_schedules_every_described_type() -> Result<()> {
    let h = harness(vec![note_descr(), published_only()]).await?;
    h.manager.async_reindex_all().await?;

    let mut pending = h.manager.reindex_queue().await?;
    pending.sort();
    assert_eq!(pending, vec!["demo$Article".to_string(), "demo$Note".to_string()]);
    Ok(())
}

#[tokio::test]
async fn test_disabled_feature_skips_reindex() -> Result<()> {
    let h = harness(vec![note_descr()]).await?;
    h.seed("demo$Note", 3, |_, e| e.with("title", "x"));
    h.manager.async_reindex_entity("demo$Note").await?;

    h.manager.set_enabled(false).await?;
    assert_eq!(h.manager.reindex_next_batch().await?, 0);
    assert_eq!(h.manager.reindex_queue().await?.len(), 1);
    assert_eq!(h.manager.queue().pending_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_reindex_batches_admit_one() -> Result<()> {
    let h = harness(vec![note_descr()]).await?;
    h.seed("demo$Note", 3, |_, e| e.with("title", "x"));
    h.manager.async_reindex_entity("demo$Note").await?;

    h.store.close_gate();
    let manager = Arc::clone(&h.manager);
    let first = tokio::spawn(async move { manager.reindex_next_batch().await });
    h.store.wait_entered().await;
    assert!(h.manager.is_reindexing());
    assert!(!h.manager.is_writing());

    let second = tokio::time::timeout(Duration::from_millis(500), h.manager.reindex_next_batch())
        .await
        .expect("contended reindex must not wait")?;
    assert_eq!(second, 0);

    h.store.open_gate();
    assert_eq!(first.await??, 3);
    assert!(!h.manager.is_reindexing());
    Ok(())
}

#[tokio::test]
async fn test_manual_reindex_replaces_queue() -> Result<()> {
    let h = harness(vec![note_descr(), published_only()]).await?;
    let notes = h.seed("demo$Note", 4, |_, e| e.with("title", "x"));
    h.seed("demo$Article", 5, |n, e| e.with("published", n < 2));

    let queue = h.manager.queue();
    queue.enqueue("demo$Note", notes[0], ChangeKind::Delete).await?;
    queue.enqueue_fake("demo$Note", notes[1]).await?;

    assert_eq!(h.manager.reindex_entity("demo$Note").await?, 4);
    let queued = queue.queued_ids("demo$Note").await?;
    assert_eq!(queued.len(), 4);
    assert_eq!(queue.fake_count("demo$Note").await?, 0);

    // Only matching instances are enqueued; no suppression rows
    assert_eq!(h.manager.reindex_entity("demo$Article").await?, 2);
    assert_eq!(queue.fake_count("demo$Article").await?, 0);

    assert_eq!(h.manager.reindex_all().await?, 6);
    assert_eq!(queue.pending_count().await?, 6);

    assert!(matches!(
        h.manager.reindex_entity("demo$Nope").await,
        Err(FtsError::InvalidEntityType(_))
    ));
    Ok(())
}
