//! The reconciliation loop.
//!
//! ```text
//! FsEvent -> EventRouter -> Debouncer -> RenameClassifier -> ChangeAction
//!                |                                              |
//!          config file                         compile -> sync -> notify
//!                |                             cleanup ---------> notify
//!         reload -> full-reload
//! ```
//!
//! All mutable state lives in one [`PipelineState`] owned by the pipeline.
//! The loop awaits each cycle before reading the next event, so compiles
//! never overlap; events that arrive meanwhile wait in the channel with
//! their original timestamps.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;

use super::collaborators::{ConfigReloader, ToolchainHandle};
use super::compile::{CompilationResult, cleanup_orphans, recompile};
use super::debouncer::Debouncer;
use super::error::{CleanupError, SyncStepError, WatchError};
use super::event::{EventRouter, FsEvent, Route};
use super::notifier::{ClientMessage, Notifier};
use super::rename::{ChangeAction, RenameClassifier};
use super::sync::{SyncOutcome, synchronize};

/// Directories and files the pipeline works on. Absolute paths.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub source_dir: PathBuf,
    pub compiled_dir: PathBuf,
    pub config_file: PathBuf,
    pub extensions: Vec<String>,
}

impl PipelinePaths {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            source_dir: settings.source_dir(),
            compiled_dir: settings.compiled_dir(),
            config_file: settings.config_file(),
            extensions: settings.collections.extensions.clone(),
        }
    }
}

/// Timing knobs and the cache pattern.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub debounce: Duration,
    pub rename_window: Duration,
    pub max_wait: Option<Duration>,
    pub cache_pattern: String,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: settings.watch.debounce(),
            rename_window: settings.watch.rename_window(),
            max_wait: settings.watch.max_wait(),
            cache_pattern: settings.cache.pattern.clone(),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Where the pipeline is between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    /// A debounce window is open.
    Accumulating,
    /// A deletion is parked waiting for a matching create.
    AwaitingRename,
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Notified,
    FailedNotified,
}

/// Everything one reconciliation cycle did.
#[derive(Debug)]
pub struct CycleReport {
    pub action: ChangeAction,
    pub compilation: Option<CompilationResult>,
    pub cleanup: Option<Result<(), CleanupError>>,
    pub sync: Option<SyncOutcome>,
    pub sync_errors: Vec<SyncStepError>,
    pub state: CycleState,
}

/// Mutable state of a running pipeline.
#[derive(Debug)]
struct PipelineState {
    debouncer: Debouncer,
    renames: RenameClassifier,
}

pub struct CollectionPipeline {
    state: PipelineState,
    router: EventRouter,
    paths: PipelinePaths,
    cache_pattern: String,
    toolchain: ToolchainHandle,
    config_reloader: Option<Arc<dyn ConfigReloader>>,
    notifier: Notifier,
}

impl CollectionPipeline {
    pub fn new(
        paths: PipelinePaths,
        options: PipelineOptions,
        toolchain: ToolchainHandle,
        notifier: Notifier,
    ) -> Result<Self, WatchError> {
        let router = EventRouter::new(&paths.source_dir, &paths.config_file, &paths.extensions)
            .map_err(|e| WatchError::ConfigError {
                reason: format!("invalid watch path: {e}"),
            })?;

        Ok(Self {
            state: PipelineState {
                debouncer: Debouncer::new(options.debounce, options.max_wait),
                renames: RenameClassifier::new(options.rename_window),
            },
            router,
            paths,
            cache_pattern: options.cache_pattern,
            toolchain,
            config_reloader: None,
            notifier,
        })
    }

    pub fn with_config_reloader(mut self, reloader: Arc<dyn ConfigReloader>) -> Self {
        self.config_reloader = Some(reloader);
        self
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn stage(&self) -> Stage {
        if self.state.debouncer.has_pending() {
            Stage::Accumulating
        } else if self.state.renames.candidate().is_some() {
            Stage::AwaitingRename
        } else {
            Stage::Idle
        }
    }

    /// Compile once before watching. Failure here is fatal.
    pub async fn initial_compile(&self) -> Result<Duration, WatchError> {
        let toolchain = self.toolchain.current().await;
        let elapsed = recompile(
            toolchain.compiler.as_ref(),
            &self.paths.source_dir,
            &self.paths.compiled_dir,
        )
        .await
        .into_result()
        .map_err(WatchError::InitialCompile)?;

        crate::log_event!("watcher", "initial compilation successful");
        Ok(elapsed)
    }

    /// Route one event. Collection events open or extend the debounce window;
    /// the configuration file is handled on the spot.
    pub async fn ingest(&mut self, mut event: FsEvent) -> Route {
        let route = self.router.route(&mut event);
        match route {
            Route::Collection => {
                crate::log_event!("watcher", "collection event", "{:?} {}", event.kind, event.path);
                self.state.debouncer.register(event);
            }
            Route::ConfigFile => self.reload_config(&event).await,
            Route::Ignored => {
                crate::debug_event!("watcher", "ignored", "{:?} {}", event.kind, event.path);
            }
        }
        route
    }

    /// Earliest instant at which [`tick`](Self::tick) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (
            self.state.debouncer.deadline(),
            self.state.renames.deadline(),
        ) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Settle whatever is due at `now` and reconcile the resulting actions.
    pub async fn tick(&mut self, now: Instant) -> Vec<CycleReport> {
        let mut actions = Vec::new();

        if let Some(batch) = self.state.debouncer.take_ready(now) {
            crate::debug_event!(
                "debounce",
                "settled",
                "window {} ({} events) {:?} {}",
                batch.window,
                batch.coalesced,
                batch.event.kind,
                batch.event.path
            );
            // Park a deletion the final event overwrote so a rename inside
            // one window still pairs up
            if let Some(deleted) = &batch.preceding_delete {
                actions.extend(self.state.renames.classify(deleted, now));
            }
            actions.extend(self.state.renames.classify(&batch.event, now));
        }
        if let Some(expired) = self.state.renames.expire(now) {
            actions.push(expired);
        }

        let mut reports = Vec::with_capacity(actions.len());
        for action in actions {
            reports.push(self.reconcile(action).await);
        }
        reports
    }

    /// Run one classified action to a terminal state and notify once.
    pub async fn reconcile(&self, action: ChangeAction) -> CycleReport {
        let toolchain = self.toolchain.current().await;
        crate::log_event!("collections", "reconciling", "{action}");

        if !action.needs_compile() {
            let cleanup = cleanup_orphans(
                toolchain.cleaner.as_ref(),
                &self.paths.source_dir,
                &self.paths.compiled_dir,
            )
            .await;
            let error = cleanup.as_ref().err().map(|e| {
                tracing::warn!("[cleanup] {e}");
                e.to_string()
            });
            self.notifier
                .send(ClientMessage::collections_updated(&action, error.as_deref()));
            return CycleReport {
                action,
                compilation: None,
                cleanup: Some(cleanup),
                sync: None,
                sync_errors: Vec::new(),
                state: CycleState::Notified,
            };
        }

        let compilation = recompile(
            toolchain.compiler.as_ref(),
            &self.paths.source_dir,
            &self.paths.compiled_dir,
        )
        .await;

        if let Some(error) = &compilation.error {
            self.notifier.send(ClientMessage::collections_updated(
                &action,
                Some(&error.detail),
            ));
            return CycleReport {
                action,
                compilation: Some(compilation),
                cleanup: None,
                sync: None,
                sync_errors: Vec::new(),
                state: CycleState::FailedNotified,
            };
        }

        // The old name's artifact is now an orphan
        let cleanup = match &action {
            ChangeAction::Renamed { .. } => {
                let result = cleanup_orphans(
                    toolchain.cleaner.as_ref(),
                    &self.paths.source_dir,
                    &self.paths.compiled_dir,
                )
                .await;
                if let Err(e) = &result {
                    tracing::warn!("[cleanup] {e}");
                }
                Some(result)
            }
            _ => None,
        };

        let (sync, sync_errors) = synchronize(&toolchain, &self.cache_pattern).await;
        self.notifier
            .send(ClientMessage::collections_updated(&action, None));

        CycleReport {
            action,
            compilation: Some(compilation),
            cleanup,
            sync: Some(sync),
            sync_errors,
            state: CycleState::Notified,
        }
    }

    async fn reload_config(&self, event: &FsEvent) {
        crate::log_event!("config", "changed", "{}", event.path);

        if let Some(reloader) = &self.config_reloader {
            if let Err(e) = reloader.reload(&self.paths.config_file).await {
                tracing::error!("[config] reload failed: {e:#}");
                return;
            }
        }
        self.notifier.send(ClientMessage::FullReload);
    }

    /// Consume events until `shutdown` fires or the channel closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<FsEvent>, shutdown: CancellationToken) {
        crate::log_event!("watcher", "started", "{}", self.paths.source_dir.display());

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    crate::debug_event!("watcher", "shutdown requested");
                    break;
                }

                received = events.recv() => match received {
                    Some(event) => {
                        self.ingest(event).await;
                    }
                    None => {
                        crate::debug_event!("watcher", "event channel closed");
                        break;
                    }
                },

                _ = wait_until(deadline) => {
                    self.tick(Instant::now()).await;
                }
            }
        }

        if self.stage() != Stage::Idle {
            crate::debug_event!("watcher", "dropping unsettled state", "{:?}", self.stage());
        }
        crate::log_event!("watcher", "stopped");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
