//! Filesystem event source and the watcher that owns it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::collaborators::{ConfigReloader, ToolchainHandle};
use super::error::WatchError;
use super::event::{FsEvent, classify_notify_event};
use super::notifier::Notifier;
use super::pipeline::{CollectionPipeline, PipelineOptions, PipelinePaths};

/// A running filesystem watch feeding a [`CollectionPipeline`].
///
/// Dropping it stops the OS watcher.
pub struct CollectionWatcher {
    pipeline: CollectionPipeline,
    events: mpsc::Receiver<FsEvent>,
    _watcher: notify::RecommendedWatcher,
    initial_compile: bool,
}

impl CollectionWatcher {
    pub fn builder() -> CollectionWatcherBuilder {
        CollectionWatcherBuilder::new()
    }

    /// Compile once (if enabled), then reconcile events until `shutdown`.
    pub async fn watch(self, shutdown: CancellationToken) -> Result<(), WatchError> {
        if self.initial_compile {
            self.pipeline.initial_compile().await?;
        }
        self.pipeline.run(self.events, shutdown).await;
        Ok(())
    }
}

/// Builder for [`CollectionWatcher`].
pub struct CollectionWatcherBuilder {
    paths: Option<PipelinePaths>,
    options: PipelineOptions,
    toolchain: Option<ToolchainHandle>,
    notifier: Option<Notifier>,
    config_reloader: Option<Arc<dyn ConfigReloader>>,
    channel_capacity: usize,
    initial_compile: bool,
}

impl CollectionWatcherBuilder {
    pub fn new() -> Self {
        Self {
            paths: None,
            options: PipelineOptions::default(),
            toolchain: None,
            notifier: None,
            config_reloader: None,
            channel_capacity: 256,
            initial_compile: true,
        }
    }

    pub fn paths(mut self, paths: PipelinePaths) -> Self {
        self.paths = Some(paths);
        self
    }

    pub fn options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn toolchain(mut self, toolchain: ToolchainHandle) -> Self {
        self.toolchain = Some(toolchain);
        self
    }

    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config_reloader(mut self, reloader: Arc<dyn ConfigReloader>) -> Self {
        self.config_reloader = Some(reloader);
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn initial_compile(mut self, enabled: bool) -> Self {
        self.initial_compile = enabled;
        self
    }

    /// Start the OS watcher and assemble the pipeline.
    pub fn build(self) -> Result<CollectionWatcher, WatchError> {
        let mut paths = self.paths.ok_or_else(|| WatchError::InitFailed {
            reason: "Paths are required".to_string(),
        })?;
        let toolchain = self.toolchain.ok_or_else(|| WatchError::InitFailed {
            reason: "Toolchain is required".to_string(),
        })?;
        let notifier = self.notifier.unwrap_or_else(|| Notifier::new(64));

        // Backends report resolved paths; compare against the same form
        paths.source_dir = canonical(&paths.source_dir);
        paths.config_file = canonical_file(&paths.config_file);

        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("[watcher] file watch error: {e}");
                    return;
                }
            };
            for (kind, path) in classify_notify_event(&event) {
                match FsEvent::normalize(kind, &path, Instant::now()) {
                    Ok(fs_event) => {
                        if tx.blocking_send(fs_event).is_err() {
                            return;
                        }
                    }
                    Err(e) => tracing::warn!("[watcher] dropped event: {e}"),
                }
            }
        })?;

        watcher
            .watch(&paths.source_dir, RecursiveMode::Recursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: paths.source_dir.clone(),
                reason: e.to_string(),
            })?;
        crate::debug_event!("watcher", "watching", "{}", paths.source_dir.display());

        // Watch the parent so atomic replaces of the file are still seen
        if let Some(parent) = paths.config_file.parent() {
            match watcher.watch(parent, RecursiveMode::NonRecursive) {
                Ok(()) => crate::debug_event!("watcher", "watching", "{}", parent.display()),
                Err(e) => {
                    tracing::warn!("[watcher] failed to watch {}: {e}", parent.display());
                }
            }
        }

        let mut pipeline = CollectionPipeline::new(paths, self.options, toolchain, notifier)?;
        if let Some(reloader) = self.config_reloader {
            pipeline = pipeline.with_config_reloader(reloader);
        }

        Ok(CollectionWatcher {
            pipeline,
            events: rx,
            _watcher: watcher,
            initial_compile: self.initial_compile,
        })
    }
}

impl Default for CollectionWatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Canonicalize through the parent so a missing file still resolves.
fn canonical_file(path: &Path) -> PathBuf {
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            canonical(parent).join(name)
        }
        _ => path.to_path_buf(),
    }
}
