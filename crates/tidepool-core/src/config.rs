//! Storage and stack configuration
//!
//! Backend selection is a configuration-time decision: a run hands its
//! config to `build_backend` and gets the active storage backend back.
//! Route conflicts and missing stores fail here, never during a call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{
    CompositeBackend, DirectoryBackend, KeyedBackend, MemoryBackend, StorageBackend,
};
use crate::interrupt::InterruptPolicy;

/// Which backend variant a route (or the default) resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Durable,
    Directory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    pub prefix: String,
    pub backend: BackendKind,
}

/// Storage configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite path for the durable keyed store
    #[serde(default)]
    pub durable_db: Option<PathBuf>,
    /// Namespace within the durable store (default: "shared")
    #[serde(default)]
    pub durable_namespace: Option<String>,
    /// Root for the real-directory backend
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// Backend for paths no route matches (default: memory)
    #[serde(default)]
    pub default_backend: Option<BackendKind>,
    /// Prefix routes for the composite backend; empty means no composite
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            durable_db: None,
            durable_namespace: None,
            root_dir: None,
            default_backend: None,
            routes: Vec::new(),
        }
    }
}

impl StorageConfig {
    /// Ephemeral-only storage.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// The common long-horizon layout: ephemeral scratch space with a
    /// durable `/memories/` route shared across runs.
    pub fn with_memories(db_path: impl Into<PathBuf>) -> Self {
        Self {
            durable_db: Some(db_path.into()),
            routes: vec![RouteConfig {
                prefix: "/memories/".to_string(),
                backend: BackendKind::Durable,
            }],
            ..Self::default()
        }
    }
}

fn make_backend(kind: BackendKind, config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    match kind {
        BackendKind::Memory => Ok(Arc::new(MemoryBackend::new())),
        BackendKind::Durable => {
            let db = config
                .durable_db
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("durable route configured but durable_db is unset"))?;
            let namespace = config.durable_namespace.as_deref().unwrap_or("shared");
            Ok(Arc::new(KeyedBackend::new(db, namespace)?))
        }
        BackendKind::Directory => {
            let root = config
                .root_dir
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("directory route configured but root_dir is unset"))?;
            Ok(Arc::new(DirectoryBackend::new(root)?))
        }
    }
}

/// Build the active storage backend for a run.
pub fn build_backend(config: &StorageConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let default = make_backend(config.default_backend.unwrap_or(BackendKind::Memory), config)?;
    if config.routes.is_empty() {
        return Ok(default);
    }

    let mut builder = CompositeBackend::builder(default);
    for route in &config.routes {
        let delegate = make_backend(route.backend, config)?;
        builder = builder.route(route.prefix.clone(), delegate)?;
    }
    Ok(Arc::new(builder.build()))
}

/// Bundled configuration for one agent stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub interrupt: Option<InterruptPolicy>,
    #[serde(default = "default_step_budget")]
    pub step_budget: usize,
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    #[serde(default)]
    pub tool_timeout_secs: Option<u64>,
}

fn default_step_budget() -> usize {
    24
}

fn default_max_depth() -> usize {
    3
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            interrupt: None,
            step_budget: default_step_budget(),
            max_depth: default_max_depth(),
            tool_timeout_secs: None,
        }
    }
}
