//! Post-compile synchronization.
//!
//! After a successful compile the cache region is cleared, the content
//! registry reloaded and types regenerated, strictly in that order. Each
//! step runs even if an earlier one failed; nothing is rolled back.

use super::collaborators::Toolchain;
use super::error::{SyncStep, SyncStepError};

/// Which steps of the chain took effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub cache_cleared: bool,
    pub registry_updated: bool,
    pub types_regenerated: bool,
}

/// Run the best-effort sync chain. Failures are logged and returned for
/// inspection; they never stop the next step.
pub async fn synchronize(
    toolchain: &Toolchain,
    cache_pattern: &str,
) -> (SyncOutcome, Vec<SyncStepError>) {
    let mut outcome = SyncOutcome::default();
    let mut errors = Vec::new();

    if toolchain.cache.is_enabled() {
        match toolchain.cache.clear(cache_pattern).await {
            Ok(()) => {
                outcome.cache_cleared = true;
                crate::log_event!("sync", "cache cleared", "{cache_pattern}");
            }
            Err(e) => errors.push(step_failed(SyncStep::CacheClear, e)),
        }
    } else {
        crate::debug_event!("sync", "cache disabled, skipped");
    }

    match toolchain.registry.update(true).await {
        Ok(()) => {
            outcome.registry_updated = true;
            crate::log_event!("sync", "registry updated");
        }
        Err(e) => errors.push(step_failed(SyncStep::RegistryUpdate, e)),
    }

    match toolchain.types.generate().await {
        Ok(()) => {
            outcome.types_regenerated = true;
            crate::log_event!("sync", "types regenerated");
        }
        Err(e) => errors.push(step_failed(SyncStep::TypeGeneration, e)),
    }

    (outcome, errors)
}

fn step_failed(step: SyncStep, e: anyhow::Error) -> SyncStepError {
    let error = SyncStepError {
        step,
        detail: format!("{e:#}"),
    };
    tracing::warn!("[sync] {error}");
    error
}
