//! Fetching binary payloads referenced by content properties

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Content reference '{0}' is not a valid storage path")]
    InvalidReference(String),

    #[error("Content '{reference}' is unavailable: {source}")]
    Unavailable {
        reference: String,
        #[source]
        source: std::io::Error,
    },
}

/// Resolves a content reference (as stored in an entity property) to text
#[async_trait]
pub trait ContentLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Result<String, ContentError>;
}

/// Reads content references as paths relative to a storage root
#[derive(Debug, Clone)]
pub struct FsContentLoader {
    root: PathBuf,
}

impl FsContentLoader {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, ContentError> {
        let relative = Path::new(reference);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reference.is_empty() || escapes {
            return Err(ContentError::InvalidReference(reference.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentLoader for FsContentLoader {
    async fn load(&self, reference: &str) -> Result<String, ContentError> {
        let path = self.resolve(reference)?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| ContentError::Unavailable {
                reference: reference.to_string(),
                source,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_loads_relative_to_root() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        std::fs::create_dir_all(temp_dir.path().join("2024"))?;
        std::fs::write(temp_dir.path().join("2024/contract.txt"), "signed copy")?;

        let loader = FsContentLoader::new(temp_dir.path());
        assert_eq!(loader.load("2024/contract.txt").await?, "signed copy");

        assert!(matches!(
            loader.load("2024/missing.txt").await,
            Err(ContentError::Unavailable { .. })
        ));
        assert!(matches!(
            loader.load("../outside.txt").await,
            Err(ContentError::InvalidReference(_))
        ));
        assert!(matches!(
            loader.load("/etc/hosts").await,
            Err(ContentError::InvalidReference(_))
        ));
        Ok(())
    }
}
