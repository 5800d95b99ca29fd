//! Collection change-reconciliation pipeline.
//!
//! Watches the collection source directory, coalesces bursts of events,
//! pairs deletions with creations into renames, recompiles the whole tree
//! and keeps caches, the content registry, generated types and connected
//! clients in step.
//!
//! # Architecture
//!
//! ```text
//! CollectionWatcher
//!   - notify::RecommendedWatcher -> mpsc<FsEvent>
//!   - CollectionPipeline
//!       EventRouter -> Debouncer -> RenameClassifier
//!       recompile / cleanup_orphans -> synchronize -> Notifier
//!   - ToolchainHandle (swappable collaborators)
//! ```

pub mod collaborators;
pub mod compile;
mod debouncer;
mod error;
pub mod event;
pub mod notifier;
pub mod pipeline;
pub mod rename;
mod source;
pub mod sync;

pub use collaborators::{
    CacheLayer, Compiler, ConfigReloader, ContentRegistry, NoCache, OrphanCleaner, Toolchain,
    ToolchainHandle, TypeGenerator,
};
pub use compile::CompilationResult;
pub use debouncer::{Debouncer, SettledBatch};
pub use error::{
    CleanupError, CompilationError, NormalizationError, SyncStep, SyncStepError, WatchError,
};
pub use event::{EventRouter, FsEvent, FsEventKind, Route, classify_notify_event};
pub use notifier::{ClientMessage, Notifier};
pub use pipeline::{
    CollectionPipeline, CycleReport, CycleState, PipelineOptions, PipelinePaths, Stage,
};
pub use rename::{ChangeAction, RenameCandidate, RenameClassifier};
pub use source::{CollectionWatcher, CollectionWatcherBuilder};
pub use sync::SyncOutcome;
