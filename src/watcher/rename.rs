//! Rename detection for settled events.
//!
//! Most backends report a rename as a deletion followed by a creation. A
//! settled deletion is parked as the rename candidate; if a create or change
//! settles within the rename window the pair becomes one [`ChangeAction::Renamed`].
//! Only the most recent deletion is ever a candidate. An older one that gets
//! superseded, or one whose window runs out, is emitted as a plain deletion.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

use super::event::{FsEvent, FsEventKind};

/// Terminal classification of a settled change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeAction {
    Added(String),
    Changed(String),
    Deleted(String),
    DeletedDir(String),
    Renamed { from: String, to: String },
}

impl ChangeAction {
    /// The path the action leaves behind (the new path for renames).
    pub fn path(&self) -> &str {
        match self {
            ChangeAction::Added(p)
            | ChangeAction::Changed(p)
            | ChangeAction::Deleted(p)
            | ChangeAction::DeletedDir(p) => p,
            ChangeAction::Renamed { to, .. } => to,
        }
    }

    /// Deletions only need orphan cleanup; everything else recompiles.
    pub fn needs_compile(&self) -> bool {
        !matches!(self, ChangeAction::Deleted(_) | ChangeAction::DeletedDir(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeAction::Added(_) => "added",
            ChangeAction::Changed(_) => "changed",
            ChangeAction::Deleted(_) => "deleted",
            ChangeAction::DeletedDir(_) => "deleted dir",
            ChangeAction::Renamed { .. } => "renamed",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Renamed { from, to } => write!(f, "renamed {from} -> {to}"),
            other => write!(f, "{} {}", other.label(), other.path()),
        }
    }
}

/// The single parked deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameCandidate {
    pub deleted_path: String,
    pub deleted_at: Instant,
    dir: bool,
}

impl RenameCandidate {
    fn into_deletion(self) -> ChangeAction {
        if self.dir {
            ChangeAction::DeletedDir(self.deleted_path)
        } else {
            ChangeAction::Deleted(self.deleted_path)
        }
    }
}

#[derive(Debug)]
pub struct RenameClassifier {
    window: Duration,
    candidate: Option<RenameCandidate>,
}

impl RenameClassifier {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            candidate: None,
        }
    }

    /// Classify an event that settled at `now`.
    ///
    /// Returns the actions to reconcile, in order. A deletion returns nothing
    /// for itself, only the candidate it displaced.
    pub fn classify(&mut self, event: &FsEvent, now: Instant) -> Vec<ChangeAction> {
        if event.kind.is_delete() {
            let displaced = self.candidate.replace(RenameCandidate {
                deleted_path: event.path.clone(),
                deleted_at: now,
                dir: event.kind == FsEventKind::DeletedDir,
            });
            if let Some(old) = &displaced {
                crate::debug_event!("rename", "candidate superseded", "{}", old.deleted_path);
            }
            return displaced.map(RenameCandidate::into_deletion).into_iter().collect();
        }

        let mut actions = Vec::with_capacity(2);
        match self.candidate.take() {
            Some(candidate) if now.saturating_duration_since(candidate.deleted_at) < self.window => {
                if candidate.deleted_path == event.path {
                    // Delete-then-create of the same file is an atomic save
                    actions.push(ChangeAction::Changed(event.path.clone()));
                } else {
                    actions.push(ChangeAction::Renamed {
                        from: candidate.deleted_path,
                        to: event.path.clone(),
                    });
                }
                return actions;
            }
            Some(stale) => actions.push(stale.into_deletion()),
            None => {}
        }

        actions.push(match event.kind {
            FsEventKind::Created => ChangeAction::Added(event.path.clone()),
            _ => ChangeAction::Changed(event.path.clone()),
        });
        actions
    }

    /// Release the candidate as a plain deletion once its window has run out.
    pub fn expire(&mut self, now: Instant) -> Option<ChangeAction> {
        let deadline = self.deadline()?;
        if deadline > now {
            return None;
        }
        self.candidate.take().map(RenameCandidate::into_deletion)
    }

    /// When the parked candidate stops being eligible.
    pub fn deadline(&self) -> Option<Instant> {
        self.candidate.as_ref().map(|c| c.deleted_at + self.window)
    }

    pub fn candidate(&self) -> Option<&RenameCandidate> {
        self.candidate.as_ref()
    }
}
