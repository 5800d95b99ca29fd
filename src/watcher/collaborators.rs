//! Contracts the pipeline consumes.
//!
//! The pipeline never compiles, caches or renders anything itself. It calls
//! through these traits, and the set it calls through lives behind a
//! [`ToolchainHandle`] so it can be swapped while the watcher runs.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Compiles the whole collection source tree.
///
/// Must not leave partial artifacts behind on failure.
#[async_trait]
pub trait Compiler: Send + Sync {
    async fn compile(&self, source_dir: &Path, output_dir: &Path) -> anyhow::Result<()>;
}

/// Removes compiled artifacts whose source is gone.
#[async_trait]
pub trait OrphanCleaner: Send + Sync {
    async fn cleanup_orphaned_files(&self, source_dir: &Path, output_dir: &Path)
    -> anyhow::Result<()>;
}

/// Namespaced cache in front of the content API.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn clear(&self, pattern: &str) -> anyhow::Result<()>;
}

/// In-memory registry of compiled collections.
#[async_trait]
pub trait ContentRegistry: Send + Sync {
    async fn update(&self, force_reload: bool) -> anyhow::Result<()>;
}

/// Regenerates type declarations derived from the collections.
#[async_trait]
pub trait TypeGenerator: Send + Sync {
    async fn generate(&self) -> anyhow::Result<()>;
}

/// Reloads application state that depends on the watched configuration file.
#[async_trait]
pub trait ConfigReloader: Send + Sync {
    async fn reload(&self, config_file: &Path) -> anyhow::Result<()>;
}

/// A cache layer that is never enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl CacheLayer for NoCache {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn clear(&self, _pattern: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Everything one reconciliation cycle calls into.
#[derive(Clone)]
pub struct Toolchain {
    pub compiler: Arc<dyn Compiler>,
    pub cleaner: Arc<dyn OrphanCleaner>,
    pub cache: Arc<dyn CacheLayer>,
    pub registry: Arc<dyn ContentRegistry>,
    pub types: Arc<dyn TypeGenerator>,
}

/// Swappable reference to the current [`Toolchain`].
///
/// Cloning shares the slot. A cycle takes one snapshot at its start, so a
/// swap never splits a cycle across two toolchains.
#[derive(Clone)]
pub struct ToolchainHandle {
    current: Arc<RwLock<Arc<Toolchain>>>,
}

impl ToolchainHandle {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(toolchain))),
        }
    }

    pub async fn current(&self) -> Arc<Toolchain> {
        self.current.read().await.clone()
    }

    /// Install a new toolchain for subsequent cycles.
    pub async fn replace(&self, toolchain: Toolchain) {
        *self.current.write().await = Arc::new(toolchain);
        crate::log_event!("toolchain", "replaced");
    }
}
