//! Whole-tree recompilation and orphan cleanup.
//!
//! The compiler always sees the entire source directory, never a single
//! file, so cross-references between collections are re-resolved together.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;

use super::collaborators::{Compiler, OrphanCleaner};
use super::error::{CleanupError, CompilationError};

/// Outcome of one compiler invocation.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub elapsed: Duration,
    pub error: Option<CompilationError>,
}

impl CompilationResult {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn into_result(self) -> Result<Duration, CompilationError> {
        match self.error {
            None => Ok(self.elapsed),
            Some(e) => Err(e),
        }
    }
}

/// Compile `source_dir` into `output_dir`, capturing any failure.
pub async fn recompile(
    compiler: &dyn Compiler,
    source_dir: &Path,
    output_dir: &Path,
) -> CompilationResult {
    let started = Instant::now();
    crate::debug_event!("compile", "started", "{}", source_dir.display());

    let outcome = compiler.compile(source_dir, output_dir).await;
    let elapsed = started.elapsed();

    match outcome {
        Ok(()) => {
            crate::log_event!("compile", "succeeded", "{} ms", elapsed.as_millis());
            CompilationResult {
                elapsed,
                error: None,
            }
        }
        Err(e) => {
            let error = CompilationError {
                source_dir: source_dir.to_path_buf(),
                elapsed,
                detail: format!("{e:#}"),
            };
            tracing::error!("[compile] {error}");
            CompilationResult {
                elapsed,
                error: Some(error),
            }
        }
    }
}

/// Remove artifacts whose source no longer exists.
pub async fn cleanup_orphans(
    cleaner: &dyn OrphanCleaner,
    source_dir: &Path,
    output_dir: &Path,
) -> Result<(), CleanupError> {
    cleaner
        .cleanup_orphaned_files(source_dir, output_dir)
        .await
        .map_err(|e| CleanupError {
            output_dir: output_dir.to_path_buf(),
            detail: format!("{e:#}"),
        })?;
    crate::log_event!("cleanup", "completed", "{}", output_dir.display());
    Ok(())
}
