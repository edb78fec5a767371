//! Local file store for fetched metadata files

use crate::storage::traits::{LocalStore, StorageError, StorageResult};
use crate::storage::{FetchMetadata, FileKey};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Writes files under `<root>/<host>/<organization>/<repository>/<generation>/`
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory receiving the files of `key`
    pub fn directory_for(&self, key: &FileKey) -> StorageResult<PathBuf> {
        let mut dir = self.root.clone();
        for part in [&key.host, &key.organization, &key.repository, &key.generation] {
            dir.push(safe_component(part)?);
        }
        Ok(dir)
    }
}

/// Rejects path parts that would escape the store root
fn safe_component(part: &str) -> StorageResult<&str> {
    let mut components = Path::new(part).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(part),
        _ => Err(StorageError::InvalidKey(part.to_string())),
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn save(
        &self,
        key: &FileKey,
        body: &[u8],
        metadata: &FetchMetadata,
    ) -> StorageResult<PathBuf> {
        let dir = self.directory_for(key)?;
        tokio::fs::create_dir_all(&dir).await?;

        let file_path = dir.join(safe_component(&key.file_name)?);
        tokio::fs::write(&file_path, body).await?;

        let sidecar = serde_json::to_vec_pretty(metadata)?;
        tokio::fs::write(dir.join("fetch.json"), sidecar).await?;

        tracing::debug!("Saved {} ({} bytes)", file_path.display(), body.len());
        Ok(file_path)
    }
}
