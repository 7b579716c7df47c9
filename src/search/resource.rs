//! Process-wide index resource handle
//!
//! The handle is opened lazily on first use and reused for the lifetime of
//! the owning `IndexResource`. Opening creates the location when missing
//! and clears a writer-lock marker left behind by an unclean shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::backend::IndexBackend;
use super::errors::{IndexError, IndexResult};

/// Opens an index backend at a filesystem location
pub trait IndexOpener: Send + Sync + 'static {
    /// Open or create the index in `location`. Called at most once per
    /// `IndexResource`.
    fn open(&self, location: &Path) -> IndexResult<Arc<dyn IndexBackend>>;

    /// File name of the exclusive-access marker the backend leaves in its
    /// location while a writer is alive
    fn lock_marker(&self) -> Option<&str> {
        None
    }
}

pub struct IndexResource {
    location: PathBuf,
    opener: Arc<dyn IndexOpener>,
    handle: OnceCell<Arc<dyn IndexBackend>>,
}

impl IndexResource {
    #[must_use]
    pub fn new(location: impl Into<PathBuf>, opener: Arc<dyn IndexOpener>) -> Self {
        Self {
            location: location.into(),
            opener,
            handle: OnceCell::new(),
        }
    }

    /// Whether the handle has been opened already
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.initialized()
    }

    /// The shared backend handle, opened on first call.
    ///
    /// Concurrent first callers wait for a single open; a failed open is not
    /// cached and the next call tries again.
    pub async fn handle(&self) -> IndexResult<Arc<dyn IndexBackend>> {
        let handle = self
            .handle
            .get_or_try_init(|| async {
                prepare_location(&self.location, self.opener.lock_marker()).await?;

                let opener = Arc::clone(&self.opener);
                let location = self.location.clone();
                let backend = tokio::task::spawn_blocking(move || opener.open(&location))
                    .await
                    .map_err(|e| IndexError::Other(format!("Index open task failed: {e}")))??;

                tracing::info!(location = %self.location.display(), "Index resource opened");
                Ok::<_, IndexError>(backend)
            })
            .await?;

        Ok(Arc::clone(handle))
    }
}

async fn prepare_location(location: &Path, marker: Option<&str>) -> IndexResult<()> {
    let unavailable = |e: std::io::Error| IndexError::ResourceUnavailable {
        path: location.to_path_buf(),
        message: e.to_string(),
    };

    if !tokio::fs::try_exists(location).await.map_err(unavailable)? {
        tokio::fs::create_dir_all(location)
            .await
            .map_err(unavailable)?;
        tracing::debug!(location = %location.display(), "Created index location");
    }

    if let Some(marker) = marker {
        let marker_path = location.join(marker);
        if tokio::fs::try_exists(&marker_path).await.map_err(unavailable)? {
            tokio::fs::remove_file(&marker_path)
                .await
                .map_err(unavailable)?;
            tracing::warn!(
                marker = %marker_path.display(),
                "Removed stale index writer lock"
            );
        }
    }

    Ok(())
}
