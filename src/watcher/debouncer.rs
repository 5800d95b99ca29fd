//! Global debouncing of collection events.
//!
//! Editors and VCS operations emit bursts of events for one logical change.
//! Recompilation covers the whole tree, so one shared window is enough:
//! every registration pushes the deadline back and only the latest event
//! survives. The exception is a deletion overwritten by a later event: it is
//! kept beside the final event so a rename inside one window is still seen
//! as a delete followed by a create. A window that keeps receiving events
//! never settles unless a maximum wait is configured.

use std::time::Duration;

use tokio::time::Instant;

use super::event::FsEvent;

/// The accumulator for the open window.
#[derive(Debug)]
struct PendingChange {
    window: u64,
    opened_at: Instant,
    last_seen: Instant,
    latest: FsEvent,
    /// Most recent deletion that a later event overwrote.
    overwritten_delete: Option<FsEvent>,
    count: usize,
}

/// A window that went quiet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettledBatch {
    /// Monotonic window id, starting at 1.
    pub window: u64,
    /// The final event seen in the window.
    pub event: FsEvent,
    /// The last deletion the final event replaced, if any.
    pub preceding_delete: Option<FsEvent>,
    /// How many events the window absorbed.
    pub coalesced: usize,
}

/// Single-slot debouncer shared by the whole watched tree.
#[derive(Debug)]
pub struct Debouncer {
    pending: Option<PendingChange>,
    /// How long the tree must be quiet before the window fires.
    duration: Duration,
    max_wait: Option<Duration>,
    windows_opened: u64,
}

impl Debouncer {
    pub fn new(duration: Duration, max_wait: Option<Duration>) -> Self {
        Self {
            pending: None,
            duration,
            max_wait,
            windows_opened: 0,
        }
    }

    /// Record an event, opening a window if none is open.
    ///
    /// Resets the quiet timer and replaces the window's event. A replaced
    /// deletion is remembered until a newer one takes its place.
    pub fn register(&mut self, event: FsEvent) {
        match self.pending.as_mut() {
            Some(pending) => {
                pending.last_seen = pending.last_seen.max(event.observed_at);
                let replaced = std::mem::replace(&mut pending.latest, event);
                if replaced.kind.is_delete() {
                    pending.overwritten_delete = Some(replaced);
                }
                pending.count += 1;
            }
            None => {
                self.windows_opened += 1;
                self.pending = Some(PendingChange {
                    window: self.windows_opened,
                    opened_at: event.observed_at,
                    last_seen: event.observed_at,
                    latest: event,
                    overwritten_delete: None,
                    count: 1,
                });
            }
        }
    }

    /// When the open window will fire if nothing else arrives.
    pub fn deadline(&self) -> Option<Instant> {
        let pending = self.pending.as_ref()?;
        let quiet = pending.last_seen + self.duration;
        Some(match self.max_wait {
            Some(cap) => quiet.min(pending.opened_at + cap),
            None => quiet,
        })
    }

    /// Close the window if its deadline has passed.
    pub fn take_ready(&mut self, now: Instant) -> Option<SettledBatch> {
        if self.deadline()? > now {
            return None;
        }
        self.pending.take().map(|pending| SettledBatch {
            window: pending.window,
            event: pending.latest,
            preceding_delete: pending.overwritten_delete,
            coalesced: pending.count,
        })
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Number of events absorbed by the open window.
    pub fn pending_count(&self) -> usize {
        self.pending.as_ref().map_or(0, |p| p.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::event::FsEventKind;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn event(kind: FsEventKind, path: &str, at: Instant) -> FsEvent {
        FsEvent {
            kind,
            path: path.to_string(),
            observed_at: at,
        }
    }

    #[test]
    fn test_debouncer_basic() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Modified, "schema/post.ts", start));

        assert!(debouncer.take_ready(start).is_none());
        assert!(debouncer.has_pending());

        let batch = debouncer.take_ready(start + ms(50)).unwrap();
        assert_eq!(batch.window, 1);
        assert_eq!(batch.event.path, "schema/post.ts");
        assert_eq!(batch.coalesced, 1);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_debouncer_resets_on_new_event() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Modified, "a.ts", start));
        debouncer.register(event(FsEventKind::Modified, "a.ts", start + ms(30)));

        // 60ms after the first event but only 30ms after the second
        assert!(debouncer.take_ready(start + ms(60)).is_none());
        assert_eq!(debouncer.deadline(), Some(start + ms(80)));

        let batch = debouncer.take_ready(start + ms(80)).unwrap();
        assert_eq!(batch.coalesced, 2);
    }

    #[test]
    fn test_debouncer_is_global_across_files() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Modified, "a.ts", start));
        debouncer.register(event(FsEventKind::Created, "b.ts", start + ms(10)));

        let batch = debouncer.take_ready(start + ms(100)).unwrap();
        assert_eq!(batch.event.path, "b.ts");
        assert_eq!(batch.event.kind, FsEventKind::Created);
        assert!(debouncer.take_ready(start + ms(200)).is_none());
    }

    #[test]
    fn test_debouncer_keeps_overwritten_delete() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Deleted, "a.ts", start));
        debouncer.register(event(FsEventKind::Created, "b.ts", start + ms(10)));

        let batch = debouncer.take_ready(start + ms(60)).unwrap();
        assert_eq!(batch.event.path, "b.ts");
        let deleted = batch.preceding_delete.unwrap();
        assert_eq!(deleted.kind, FsEventKind::Deleted);
        assert_eq!(deleted.path, "a.ts");
    }

    #[test]
    fn test_debouncer_keeps_latest_overwritten_delete() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Deleted, "a.ts", start));
        debouncer.register(event(FsEventKind::Deleted, "b.ts", start));
        debouncer.register(event(FsEventKind::Modified, "c.ts", start));
        debouncer.register(event(FsEventKind::Modified, "d.ts", start));

        let batch = debouncer.take_ready(start + ms(50)).unwrap();
        assert_eq!(batch.event.path, "d.ts");
        assert_eq!(batch.preceding_delete.unwrap().path, "b.ts");
    }

    #[test]
    fn test_debouncer_plain_changes_carry_no_delete() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        debouncer.register(event(FsEventKind::Modified, "a.ts", start));
        debouncer.register(event(FsEventKind::Deleted, "b.ts", start + ms(5)));

        let batch = debouncer.take_ready(start + ms(55)).unwrap();
        assert_eq!(batch.event.kind, FsEventKind::Deleted);
        assert!(batch.preceding_delete.is_none());
    }

    #[test]
    fn test_debouncer_never_fires_while_busy_without_cap() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), None);

        for i in 0..20 {
            let at = start + ms(i * 40);
            debouncer.register(event(FsEventKind::Modified, "a.ts", at));
            assert!(debouncer.take_ready(at).is_none());
        }
        assert_eq!(debouncer.pending_count(), 20);
    }

    #[test]
    fn test_debouncer_max_wait_forces_settle() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(50), Some(ms(120)));

        debouncer.register(event(FsEventKind::Modified, "a.ts", start));
        debouncer.register(event(FsEventKind::Modified, "a.ts", start + ms(40)));
        debouncer.register(event(FsEventKind::Modified, "a.ts", start + ms(80)));
        debouncer.register(event(FsEventKind::Modified, "a.ts", start + ms(115)));

        assert_eq!(debouncer.deadline(), Some(start + ms(120)));
        let batch = debouncer.take_ready(start + ms(120)).unwrap();
        assert_eq!(batch.coalesced, 4);
    }

    #[test]
    fn test_window_ids_increase() {
        let start = Instant::now();
        let mut debouncer = Debouncer::new(ms(10), None);

        debouncer.register(event(FsEventKind::Modified, "a.ts", start));
        let first = debouncer.take_ready(start + ms(10)).unwrap();
        debouncer.register(event(FsEventKind::Modified, "a.ts", start + ms(20)));
        let second = debouncer.take_ready(start + ms(30)).unwrap();

        assert_eq!(first.window, 1);
        assert_eq!(second.window, 2);
    }
}
