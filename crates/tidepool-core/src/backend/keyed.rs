//! Durable keyed backend
//!
//! Files persist in SQLite under a (namespace, path) key so future runs
//! can retrieve them. A connection is opened per operation; SQLite
//! serializes writes to the same row, concurrent reads are safe.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::{FsError, FsResult, StorageBackend};

pub struct KeyedBackend {
    db_path: PathBuf,
    namespace: String,
}

impl KeyedBackend {
    /// Open (creating if needed) the store at `db_path`, scoped to
    /// `namespace`. Schema setup failures are construction-time errors.
    pub fn new(db_path: impl AsRef<Path>, namespace: impl Into<String>) -> anyhow::Result<Self> {
        let backend = Self {
            db_path: db_path.as_ref().to_path_buf(),
            namespace: namespace.into(),
        };
        backend.conn()?;
        Ok(backend)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn conn(&self) -> FsResult<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS files (
                namespace TEXT NOT NULL,
                path TEXT NOT NULL,
                content TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, path)
            )",
        )?;
        Ok(conn)
    }
}

#[async_trait]
impl StorageBackend for KeyedBackend {
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT path FROM files WHERE namespace = ?1 ORDER BY path",
        )?;
        let paths = stmt
            .query_map([&self.namespace], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths
            .into_iter()
            .filter(|p| p.starts_with(prefix))
            .collect())
    }

    async fn load(&self, path: &str) -> FsResult<String> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT content FROM files WHERE namespace = ?1 AND path = ?2",
            params![self.namespace, path],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| FsError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, content: &str) -> FsResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO files (namespace, path, content, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.namespace, path, content, now],
        )?;
        tracing::debug!(namespace = %self.namespace, path = %path, "Wrote durable file");
        Ok(())
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        let conn = self.conn()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM files WHERE namespace = ?1 AND path = ?2",
                params![self.namespace, path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
