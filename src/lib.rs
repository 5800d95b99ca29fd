//! Collection change-reconciliation for content-type sources.
//!
//! Watches a directory of collection definitions, recompiles the tree when it
//! settles, and keeps caches, the content registry, generated types and
//! connected clients in step. See [`watcher`] for the pipeline itself.

pub mod cli;
pub mod config;
pub mod logging;
pub mod toolchain;
pub mod watcher;

pub use config::Settings;
pub use watcher::{
    ChangeAction, ClientMessage, CollectionPipeline, CollectionWatcher, Notifier, Toolchain,
    ToolchainHandle, WatchError,
};
