//! Adapter from `notify` events to root-relative [`ChangeEvent`]s.
//!
//! The watcher callback only translates and enqueues; all disk reads happen
//! later in the consumer.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use replica_core::RelativePath;

use crate::error::{io_err, ClientError};
use crate::queue::{ChangeEvent, PendingOp, SyncQueue};

/// How long a rename's `From` half waits for its `To` half before it is
/// treated as a move out of the tree.
pub const RENAME_PAIR_TIMEOUT: Duration = Duration::from_millis(500);

/// Subscribe to recursive changes under `root`, enqueueing each one.
///
/// Events stop when the returned watcher is dropped. Must be called from
/// within a tokio runtime: unpaired rename halves are flushed by a
/// background task that lives as long as the watcher.
pub fn watch(root: &Path, queue: SyncQueue) -> Result<RecommendedWatcher, ClientError> {
    // Canonicalize so that FSEvents paths (which arrive as real paths, e.g.
    // /private/var/... on macOS) still strip against the root.
    let canonical = fs::canonicalize(root).map_err(|e| io_err(root, e))?;
    let translator = Arc::new(Mutex::new(EventTranslator::new(
        root.to_path_buf(),
        canonical.clone(),
    )));

    let callback_translator = translator.clone();
    let callback_queue = queue.clone();
    let mut watcher = recommended_watcher(move |event: notify::Result<Event>| match event {
        Ok(event) => {
            // Enqueue under the lock so the flusher cannot interleave.
            let mut translator = lock(&callback_translator);
            let changes = translator.translate(&event);
            enqueue_all(&callback_queue, changes);
        }
        Err(err) => tracing::warn!(error = %err, "watcher event error"),
    })?;

    watcher.watch(&canonical, RecursiveMode::Recursive)?;
    tokio::spawn(flush_unpaired_renames(Arc::downgrade(&translator), queue));
    tracing::info!(root = %canonical.display(), "watching source tree");
    Ok(watcher)
}

/// Periodically emit rename `From` halves whose `To` never came.
///
/// Stops once the watcher (the only strong owner of the translator) is
/// dropped or the queue's consumer is gone.
pub async fn flush_unpaired_renames(translator: Weak<Mutex<EventTranslator>>, queue: SyncQueue) {
    let mut ticker = tokio::time::interval(RENAME_PAIR_TIMEOUT / 2);
    loop {
        ticker.tick().await;
        let Some(shared) = translator.upgrade() else {
            break;
        };
        if queue.is_closed() {
            break;
        }
        let mut guard = lock(&shared);
        let expired = guard.flush_expired(Instant::now());
        enqueue_all(&queue, expired);
    }
    tracing::debug!("rename flusher stopped");
}

fn lock(translator: &Mutex<EventTranslator>) -> MutexGuard<'_, EventTranslator> {
    // The translator holds no invariant a panicking holder could break.
    translator.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn enqueue_all(queue: &SyncQueue, changes: Vec<ChangeEvent>) {
    for change in changes {
        if !queue.enqueue(PendingOp::Live(change)) {
            break;
        }
    }
}

/// Stateful translation of raw events.
///
/// Holds back a rename's `From` half until its `To` half (same tracker)
/// arrives. An unmatched `From` is flushed as a delete on the next event,
/// or by [`EventTranslator::flush_expired`] once [`RENAME_PAIR_TIMEOUT`]
/// has passed.
#[derive(Debug)]
pub struct EventTranslator {
    root: PathBuf,
    canonical_root: PathBuf,
    pending_from: Option<PendingFrom>,
    last_rename: Option<(RelativePath, RelativePath)>,
}

#[derive(Debug)]
struct PendingFrom {
    tracker: Option<usize>,
    path: RelativePath,
    since: Instant,
}

impl EventTranslator {
    pub fn new(root: PathBuf, canonical_root: PathBuf) -> Self {
        Self {
            root,
            canonical_root,
            pending_from: None,
            last_rename: None,
        }
    }

    pub fn translate(&mut self, event: &Event) -> Vec<ChangeEvent> {
        let mut out = Vec::new();

        match &event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                self.flush_pending(&mut out);
                if let Some(path) = self.first_relative(event) {
                    self.pending_from = Some(PendingFrom {
                        tracker: event.tracker(),
                        path,
                        since: Instant::now(),
                    });
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let to = self.first_relative(event);
                match (self.pending_from.take(), to) {
                    (Some(pending), Some(to)) if pending.tracker == event.tracker() => {
                        self.push_rename(&mut out, pending.path, to);
                    }
                    (pending, to) => {
                        if let Some(pending) = pending {
                            out.push(ChangeEvent::Deleted(pending.path));
                        }
                        if let Some(to) = to {
                            out.push(ChangeEvent::Created(to));
                        }
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let from = event.paths.first().and_then(|p| self.relative(p));
                let to = event.paths.get(1).and_then(|p| self.relative(p));
                match (from, to) {
                    (Some(from), Some(to)) => {
                        if self.last_rename.as_ref() == Some(&(from.clone(), to.clone())) {
                            // Already emitted from the From/To pair.
                            self.last_rename = None;
                        } else {
                            if matches!(&self.pending_from, Some(pending) if pending.path == from) {
                                self.pending_from = None;
                            }
                            self.flush_pending(&mut out);
                            self.push_rename(&mut out, from, to);
                        }
                    }
                    (Some(from), None) => {
                        self.flush_pending(&mut out);
                        out.push(ChangeEvent::Deleted(from));
                    }
                    (None, Some(to)) => {
                        self.flush_pending(&mut out);
                        out.push(ChangeEvent::Created(to));
                    }
                    (None, None) => {}
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                // Unpaired rename notification: decide by what is on disk now.
                self.flush_pending(&mut out);
                for path in &event.paths {
                    if let Some(rel) = self.relative(path) {
                        if path.exists() {
                            out.push(ChangeEvent::Created(rel));
                        } else {
                            out.push(ChangeEvent::Deleted(rel));
                        }
                    }
                }
            }
            EventKind::Create(_) => {
                self.flush_pending(&mut out);
                out.extend(self.all_relative(event).map(ChangeEvent::Created));
            }
            EventKind::Modify(_) => {
                self.flush_pending(&mut out);
                out.extend(self.all_relative(event).map(ChangeEvent::Changed));
            }
            EventKind::Remove(_) => {
                self.flush_pending(&mut out);
                out.extend(self.all_relative(event).map(ChangeEvent::Deleted));
            }
            EventKind::Access(_) | EventKind::Any | EventKind::Other => {}
        }

        out
    }

    fn push_rename(&mut self, out: &mut Vec<ChangeEvent>, from: RelativePath, to: RelativePath) {
        self.last_rename = Some((from.clone(), to.clone()));
        out.push(ChangeEvent::Renamed { from, to });
    }

    /// Emit a held `From` half as a delete if it has waited out
    /// [`RENAME_PAIR_TIMEOUT`] by `now`.
    pub fn flush_expired(&mut self, now: Instant) -> Vec<ChangeEvent> {
        let mut out = Vec::new();
        let expired = self
            .pending_from
            .as_ref()
            .is_some_and(|pending| now.saturating_duration_since(pending.since) >= RENAME_PAIR_TIMEOUT);
        if expired {
            self.flush_pending(&mut out);
        }
        out
    }

    fn flush_pending(&mut self, out: &mut Vec<ChangeEvent>) {
        if let Some(pending) = self.pending_from.take() {
            tracing::debug!(path = %pending.path, "rename source left the tree");
            out.push(ChangeEvent::Deleted(pending.path));
        }
    }

    fn first_relative(&self, event: &Event) -> Option<RelativePath> {
        event.paths.first().and_then(|p| self.relative(p))
    }

    fn all_relative<'a>(&'a self, event: &'a Event) -> impl Iterator<Item = RelativePath> + 'a {
        event.paths.iter().filter_map(|p| self.relative(p))
    }

    fn relative(&self, path: &Path) -> Option<RelativePath> {
        let base = if path.starts_with(&self.canonical_root) {
            &self.canonical_root
        } else if path.starts_with(&self.root) {
            &self.root
        } else {
            return None;
        };
        if path == base {
            return None;
        }
        match RelativePath::from_fs_path(base, path) {
            Ok(rel) => Some(rel),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring change to unsyncable path");
                None
            }
        }
    }
}
