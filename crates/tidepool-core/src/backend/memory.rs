//! Ephemeral in-memory backend
//!
//! Files live only as long as the owning stack. A `BTreeMap` keeps
//! listings lexicographic without a sort on every call.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::{FsError, FsResult, StorageBackend};

#[derive(Default)]
pub struct MemoryBackend {
    files: RwLock<BTreeMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of files currently held.
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let files = self.files.read();
        Ok(files
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    async fn load(&self, path: &str) -> FsResult<String> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> FsResult<()> {
        self.files
            .write()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        Ok(self.files.read().contains_key(path))
    }
}
