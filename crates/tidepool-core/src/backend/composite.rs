//! Composite backend: longest-prefix routing to delegates
//!
//! Routes are registered against literal path prefixes; every operation
//! resolves its route once by longest-prefix match, falling back to a
//! required default delegate. Delegates see the full path - prefixes are
//! routing keys, not mount points.
//!
//! Duplicate prefixes are a configuration error raised by the builder,
//! never at call time.

use async_trait::async_trait;
use std::sync::Arc;

use super::{FsError, FsResult, StorageBackend};

struct Route {
    prefix: String,
    backend: Arc<dyn StorageBackend>,
}

pub struct CompositeBackend {
    /// Sorted by descending prefix length so the first match wins.
    routes: Vec<Route>,
    default: Arc<dyn StorageBackend>,
}

pub struct CompositeBuilder {
    routes: Vec<Route>,
    default: Arc<dyn StorageBackend>,
}

impl CompositeBuilder {
    pub fn new(default: Arc<dyn StorageBackend>) -> Self {
        Self {
            routes: Vec::new(),
            default,
        }
    }

    /// Route every path under `prefix` to `backend`.
    pub fn route(
        mut self,
        prefix: impl Into<String>,
        backend: Arc<dyn StorageBackend>,
    ) -> anyhow::Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            anyhow::bail!("route prefix must not be empty (the default delegate covers unmatched paths)");
        }
        if self.routes.iter().any(|r| r.prefix == prefix) {
            anyhow::bail!("duplicate route prefix {:?}", prefix);
        }
        self.routes.push(Route { prefix, backend });
        Ok(self)
    }

    pub fn build(mut self) -> CompositeBackend {
        self.routes
            .sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()).then(a.prefix.cmp(&b.prefix)));
        CompositeBackend {
            routes: self.routes,
            default: self.default,
        }
    }
}

impl CompositeBackend {
    pub fn builder(default: Arc<dyn StorageBackend>) -> CompositeBuilder {
        CompositeBuilder::new(default)
    }

    /// Index of the route owning `path`, or `None` for the default.
    fn route_index(&self, path: &str) -> Option<usize> {
        self.routes.iter().position(|r| path.starts_with(&r.prefix))
    }

    fn delegate(&self, path: &str) -> &Arc<dyn StorageBackend> {
        match self.route_index(path) {
            Some(i) => &self.routes[i].backend,
            None => &self.default,
        }
    }
}

#[async_trait]
impl StorageBackend for CompositeBackend {
    async fn list(&self, prefix: &str) -> FsResult<Vec<String>> {
        let mut merged = Vec::new();

        // A route can hold paths under `prefix` only if one prefix extends
        // the other; a delegate may also hold paths that route elsewhere
        // (it can be shared), so results are re-filtered by ownership.
        for (i, route) in self.routes.iter().enumerate() {
            if !(route.prefix.starts_with(prefix) || prefix.starts_with(&route.prefix)) {
                continue;
            }
            for path in route.backend.list(prefix).await? {
                if self.route_index(&path) == Some(i) {
                    merged.push(path);
                }
            }
        }
        for path in self.default.list(prefix).await? {
            if self.route_index(&path).is_none() {
                merged.push(path);
            }
        }

        merged.sort();
        merged.dedup();
        Ok(merged)
    }

    async fn load(&self, path: &str) -> FsResult<String> {
        self.delegate(path).load(path).await
    }

    async fn write(&self, path: &str, content: &str) -> FsResult<()> {
        self.delegate(path).write(path, content).await
    }

    async fn exists(&self, path: &str) -> FsResult<bool> {
        self.delegate(path).exists(path).await
    }
}
