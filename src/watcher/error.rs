//! Error types for the collection watcher.
//!
//! Only [`WatchError`] can stop the watcher, and only during setup. The rest
//! are logged by the pipeline and the loop keeps going.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors from watcher setup and the event source.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch path {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Initial compilation failed: {0}")]
    InitialCompile(#[source] CompilationError),

    #[error("Failed to load config: {reason}")]
    ConfigError { reason: String },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}

/// A raw filesystem notification that could not be turned into an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    #[error("empty path")]
    EmptyPath,

    #[error("path is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),
}

/// The compiler collaborator rejected the source tree.
#[derive(Error, Debug, Clone)]
#[error("compiling {source_dir} failed after {elapsed:?}: {detail}")]
pub struct CompilationError {
    pub source_dir: PathBuf,
    pub elapsed: Duration,
    /// Full error chain as reported by the compiler.
    pub detail: String,
}

/// One step of the post-compile sync chain failed.
#[derive(Error, Debug, Clone)]
#[error("{step} failed: {detail}")]
pub struct SyncStepError {
    pub step: SyncStep,
    pub detail: String,
}

/// Orphaned artifact cleanup failed.
#[derive(Error, Debug, Clone)]
#[error("orphan cleanup in {output_dir} failed: {detail}")]
pub struct CleanupError {
    pub output_dir: PathBuf,
    pub detail: String,
}

/// Steps of the post-compile sync chain, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    CacheClear,
    RegistryUpdate,
    TypeGeneration,
}

impl std::fmt::Display for SyncStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncStep::CacheClear => "cache clear",
            SyncStep::RegistryUpdate => "registry update",
            SyncStep::TypeGeneration => "type generation",
        };
        f.write_str(name)
    }
}
