//! Test utilities shared by the pipeline integration tests

use anyhow::Result;
use async_trait::async_trait;
use kodegen_tools_fts::config::WithDataDir;
use kodegen_tools_fts::{
    EntityDescr, EntityDocument, EntitySnapshot, EntityStore, FtsConfig, FtsConfigBuilder,
    FtsDependencies, FtsManager, IndexBackend, IndexError, IndexOpener, IndexResult,
    MemoryEntityStore, StaticSchemaProvider, StoreError,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

/// Index backend that keeps documents in a map and records every call
#[derive(Default)]
pub struct RecordingBackend {
    documents: Mutex<BTreeMap<String, EntityDocument>>,
    operations: Mutex<Vec<String>>,
    failing: Mutex<HashSet<Uuid>>,
    unavailable: Mutex<HashSet<Uuid>>,
    maintenance_fails: AtomicBool,
    optimize_gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    commits: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingBackend {
    /// Make every write or delete of `id` fail with a non-resource error
    pub fn fail_on(&self, id: Uuid) {
        self.failing.lock().insert(id);
    }

    /// Make every write or delete of `id` fail as if the index were gone
    pub fn fail_resource_on(&self, id: Uuid) {
        self.unavailable.lock().insert(id);
    }

    pub fn heal(&self, id: Uuid) {
        self.failing.lock().remove(&id);
        self.unavailable.lock().remove(&id);
    }

    /// Make `optimize` and `upgrade` fail
    pub fn fail_maintenance(&self) {
        self.maintenance_fails.store(true, Ordering::SeqCst);
    }

    /// Block the next `optimize` until the returned sender fires
    pub fn block_optimize(&self) -> std::sync::mpsc::Sender<()> {
        let (tx, rx) = std::sync::mpsc::channel();
        *self.optimize_gate.lock() = Some(rx);
        tx
    }

    pub fn contains(&self, entity_type: &str, id: Uuid) -> bool {
        self.documents
            .lock()
            .contains_key(&kodegen_tools_fts::search::document_key(entity_type, id))
    }

    pub fn document(&self, entity_type: &str, id: Uuid) -> Option<EntityDocument> {
        self.documents
            .lock()
            .get(&kodegen_tools_fts::search::document_key(entity_type, id))
            .cloned()
    }

    pub fn documents(&self) -> Vec<EntityDocument> {
        self.documents.lock().values().cloned().collect()
    }

    pub fn operations(&self) -> Vec<String> {
        self.operations.lock().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn record(&self, operation: String) {
        self.operations.lock().push(operation);
    }

    fn check(&self, entity_type: &str, id: Uuid) -> IndexResult<()> {
        if self.failing.lock().contains(&id) {
            return Err(IndexError::IndexingFailed {
                entity_type: entity_type.to_string(),
                entity_id: id.to_string(),
                message: "injected failure".to_string(),
            });
        }
        if self.unavailable.lock().contains(&id) {
            return Err(IndexError::CommitFailed("index directory gone".to_string()));
        }
        Ok(())
    }

    fn check_maintenance(&self) -> IndexResult<()> {
        if self.maintenance_fails.load(Ordering::SeqCst) {
            return Err(IndexError::Other("segment merge refused".to_string()));
        }
        Ok(())
    }
}

impl IndexBackend for RecordingBackend {
    fn upsert(&self, document: &EntityDocument) -> IndexResult<()> {
        self.check(&document.entity_type, document.entity_id)?;
        self.record(format!("upsert {}", document.key()));
        self.documents
            .lock()
            .insert(document.key(), document.clone());
        Ok(())
    }

    fn delete(&self, entity_type: &str, entity_id: Uuid) -> IndexResult<()> {
        self.check(entity_type, entity_id)?;
        let key = kodegen_tools_fts::search::document_key(entity_type, entity_id);
        self.record(format!("delete {key}"));
        self.documents.lock().remove(&key);
        Ok(())
    }

    fn delete_entity_type(&self, entity_type: &str) -> IndexResult<()> {
        self.record(format!("delete_entity_type {entity_type}"));
        self.documents
            .lock()
            .retain(|_, document| document.entity_type != entity_type);
        Ok(())
    }

    fn delete_all(&self) -> IndexResult<()> {
        self.record("delete_all".to_string());
        self.documents.lock().clear();
        Ok(())
    }

    fn commit(&self) -> IndexResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn optimize(&self) -> IndexResult<()> {
        let gate = self.optimize_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.recv();
        }
        self.check_maintenance()?;
        self.record("optimize".to_string());
        Ok(())
    }

    fn upgrade(&self) -> IndexResult<()> {
        self.check_maintenance()?;
        self.record("upgrade".to_string());
        Ok(())
    }

    fn document_count(&self, entity_type: Option<&str>) -> IndexResult<u64> {
        let documents = self.documents.lock();
        let count = match entity_type {
            None => documents.len(),
            Some(entity_type) => documents
                .values()
                .filter(|document| document.entity_type == entity_type)
                .count(),
        };
        Ok(count as u64)
    }
}

/// Hands out one shared `RecordingBackend`
pub struct RecordingOpener {
    pub backend: Arc<RecordingBackend>,
    pub opened: AtomicUsize,
}

impl IndexOpener for RecordingOpener {
    fn open(&self, _location: &Path) -> IndexResult<Arc<dyn IndexBackend>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(self.backend.clone())
    }
}

/// Entity store whose reads can be held at a gate, for contention tests
#[derive(Default)]
pub struct GatedEntityStore {
    pub inner: MemoryEntityStore,
    closed: AtomicBool,
    entered: Notify,
    release: Notify,
    scan_cursors: Mutex<Vec<Option<Uuid>>>,
}

#[allow(dead_code)]
impl GatedEntityStore {
    /// Hold the next read until `open_gate`
    pub fn close_gate(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn open_gate(&self) {
        self.closed.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    /// Wait until a read is held at the gate
    pub async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    /// The `after` argument of every scan so far
    pub fn scan_cursors(&self) -> Vec<Option<Uuid>> {
        self.scan_cursors.lock().clone()
    }

    async fn pass_gate(&self) {
        if self.closed.load(Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
    }
}

#[async_trait]
impl EntityStore for GatedEntityStore {
    fn has_entity_type(&self, entity_type: &str) -> bool {
        self.inner.has_entity_type(entity_type)
    }

    async fn load(&self, entity_type: &str, id: Uuid) -> Result<Option<EntitySnapshot>, StoreError> {
        self.pass_gate().await;
        self.inner.load(entity_type, id).await
    }

    async fn scan_ids(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<Uuid>, StoreError> {
        self.pass_gate().await;
        self.scan_cursors.lock().push(after);
        self.inner.scan_ids(entity_type, after, limit).await
    }

    async fn scan(
        &self,
        entity_type: &str,
        after: Option<Uuid>,
        limit: Option<usize>,
    ) -> Result<Vec<EntitySnapshot>, StoreError> {
        self.pass_gate().await;
        self.scan_cursors.lock().push(after);
        self.inner.scan(entity_type, after, limit).await
    }
}

/// A manager over a recording backend and a gated in-memory store
pub struct Harness {
    pub manager: Arc<FtsManager>,
    pub store: Arc<GatedEntityStore>,
    pub backend: Arc<RecordingBackend>,
    pub opener: Arc<RecordingOpener>,
    pub dir: TempDir,
}

#[allow(dead_code)]
impl Harness {
    /// Insert `count` instances built by `make` and return their ids
    pub fn seed(
        &self,
        entity_type: &str,
        count: usize,
        make: impl Fn(usize, EntitySnapshot) -> EntitySnapshot,
    ) -> Vec<Uuid> {
        (0..count)
            .map(|n| {
                let entity = make(n, EntitySnapshot::new(entity_type, Uuid::new_v4()));
                let id = entity.id;
                self.store.inner.put(entity);
                id
            })
            .collect()
    }
}

#[allow(dead_code)]
pub async fn harness(descriptors: Vec<EntityDescr>) -> Result<Harness> {
    harness_with(descriptors, |builder| builder).await
}

#[allow(dead_code)]
pub async fn harness_with(
    descriptors: Vec<EntityDescr>,
    configure: impl FnOnce(FtsConfigBuilder<WithDataDir>) -> FtsConfigBuilder<WithDataDir>,
) -> Result<Harness> {
    init_tracing();
    let dir = TempDir::new()?;
    let config = configure(FtsConfig::builder().data_dir(dir.path())).build()?;

    let store = Arc::new(GatedEntityStore::default());
    for descr in &descriptors {
        store.inner.register_type(descr.name());
    }

    let backend = Arc::new(RecordingBackend::default());
    let opener = Arc::new(RecordingOpener {
        backend: Arc::clone(&backend),
        opened: AtomicUsize::new(0),
    });

    let deps = FtsDependencies::new(
        store.clone(),
        Arc::new(StaticSchemaProvider::new(descriptors)),
    )
    .with_index_opener(opener.clone());
    let manager = Arc::new(FtsManager::open(config, deps).await?);

    Ok(Harness {
        manager,
        store,
        backend,
        opener,
        dir,
    })
}

/// Poll `condition` until it holds, failing after two seconds
#[allow(dead_code)]
pub async fn wait_until(condition: impl Fn() -> bool) -> Result<()> {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;
    Ok(())
}

/// Route pipeline logs to the test output when `RUST_LOG` is set
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
