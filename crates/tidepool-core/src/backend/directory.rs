//! Real-directory backend
//!
//! Maps virtual paths one-to-one onto a directory tree rooted at a
//! configured path. Host filesystem errors (permissions, disk full)
//! surface as `FsError::Io` and are not retried.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::{FsError, FsResult, StorageBackend};

pub struct DirectoryBackend {
    root: PathBuf,
}

impl DirectoryBackend {
    /// Root the backend at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path under the root. Traversal components are
    /// rejected so a stack cannot escape its configured tree.
    fn resolve(&self, path: &str) -> FsResult<PathBuf> {
        let rel = path.trim_start_matches('/');
        if rel.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }
        let rel_path = Path::new(rel);
        for component in rel_path.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(FsError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(rel_path))
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
    }
}

#[async_trait]
impl StorageBackend for DirectoryBackend {
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let mut paths = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(rel) = self.relative(&path) {
                        if rel.starts_with(prefix.trim_start_matches('/')) {
                            paths.push(rel);
                        }
                    }
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn load(&self, path: &str) -> FsResult<String> {
        let resolved = self.resolve(path)?;
        match fs::read_to_string(&resolved).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(FsError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, content: &str) -> FsResult<()> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&resolved, content).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        let resolved = self.resolve(path)?;
        Ok(fs::try_exists(&resolved).await?)
    }
}
