//! Event normalization and routing.
//!
//! Raw notifications from `notify` become [`FsEvent`]s with forward-slash
//! paths and a monotonic observation time. The [`EventRouter`] then decides
//! whether an event belongs to the collection pipeline, the configuration
//! file path, or nobody.

use std::path::{Path, PathBuf};

use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use tokio::time::Instant;

use super::error::NormalizationError;

/// Kind of a normalized filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
    DeletedDir,
}

impl FsEventKind {
    pub fn is_delete(self) -> bool {
        matches!(self, FsEventKind::Deleted | FsEventKind::DeletedDir)
    }
}

/// A filesystem event in canonical form. Produced once per raw notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub kind: FsEventKind,
    /// Forward-slash separated path.
    pub path: String,
    pub observed_at: Instant,
}

impl FsEvent {
    /// Normalize a raw `(kind, path)` pair observed at `observed_at`.
    pub fn normalize(
        kind: FsEventKind,
        raw: &Path,
        observed_at: Instant,
    ) -> Result<Self, NormalizationError> {
        Ok(Self {
            kind,
            path: normalize_path(raw)?,
            observed_at,
        })
    }
}

/// Canonicalize separators: backslashes become `/`, repeated separators
/// collapse, and a trailing separator is dropped.
pub fn normalize_path(raw: &Path) -> Result<String, NormalizationError> {
    if raw.as_os_str().is_empty() {
        return Err(NormalizationError::EmptyPath);
    }
    let text = raw
        .to_str()
        .ok_or_else(|| NormalizationError::NotUtf8(raw.to_path_buf()))?;

    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let ch = if ch == '\\' { '/' } else { ch };
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    Ok(out)
}

/// Map a `notify` event onto zero or more `(kind, path)` pairs.
///
/// Access and metadata-only events are dropped. Renames reported as a
/// single event become a delete of the old path plus a create of the new.
pub fn classify_notify_event(event: &notify::Event) -> Vec<(FsEventKind, PathBuf)> {
    let paths = &event.paths;
    let all = |kind: FsEventKind| -> Vec<(FsEventKind, PathBuf)> {
        paths.iter().map(|p| (kind, p.clone())).collect()
    };

    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => all(FsEventKind::Created),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(FsEventKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(FsEventKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => vec![
            (FsEventKind::Deleted, paths[0].clone()),
            (FsEventKind::Created, paths[1].clone()),
        ],
        // Backends that cannot tell which side of a rename they saw
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    FsEventKind::Created
                } else {
                    FsEventKind::Deleted
                };
                (kind, p.clone())
            })
            .collect(),
        EventKind::Modify(_) => all(FsEventKind::Modified),
        EventKind::Remove(RemoveKind::Folder) => all(FsEventKind::DeletedDir),
        EventKind::Remove(_) => all(FsEventKind::Deleted),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

/// Where a normalized event should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// A collection source file (or directory removal) under the source root.
    Collection,
    /// The watched configuration file.
    ConfigFile,
    Ignored,
}

/// Decides which path an event takes.
#[derive(Debug, Clone)]
pub struct EventRouter {
    source_root: String,
    config_file: String,
    extensions: Vec<String>,
}

impl EventRouter {
    pub fn new(
        source_root: &Path,
        config_file: &Path,
        extensions: &[String],
    ) -> Result<Self, NormalizationError> {
        Ok(Self {
            source_root: normalize_path(source_root)?,
            config_file: normalize_path(config_file)?,
            extensions: extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_string())
                .collect(),
        })
    }

    /// Route an event. A deletion under the source root without a file
    /// extension is taken to be a directory leaving the tree (moves report
    /// it as a plain rename-from) and is promoted to [`FsEventKind::DeletedDir`].
    pub fn route(&self, event: &mut FsEvent) -> Route {
        if event.path == self.config_file {
            return Route::ConfigFile;
        }
        if !self.is_under_root(&event.path) {
            return Route::Ignored;
        }
        if event.kind == FsEventKind::Deleted && Path::new(&event.path).extension().is_none() {
            event.kind = FsEventKind::DeletedDir;
        }
        if event.kind == FsEventKind::DeletedDir || self.has_source_extension(&event.path) {
            Route::Collection
        } else {
            Route::Ignored
        }
    }

    fn is_under_root(&self, path: &str) -> bool {
        path.strip_prefix(self.source_root.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    fn has_source_extension(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| allowed == ext))
    }
}
