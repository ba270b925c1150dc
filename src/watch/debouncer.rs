//! Per-path debounce and cooldown.
//!
//! Every raw event for a path (re)starts a timer of `debounce`. When the
//! timer runs out without further events, one [`WatchedChange`] carrying the
//! latest event's kind and time is emitted, unless the same path was emitted
//! less than `cooldown` ago.
//!
//! Timers are tokio tasks. A restarted timer is aborted, and each pending
//! entry carries a generation number so a timer that already woke up cannot
//! emit a superseded burst.

use super::{is_watched_path, ChangeKind, WatchedChange};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

struct PendingChange {
    generation: u64,
    kind: ChangeKind,
    detected_at: DateTime<Local>,
    timer: JoinHandle<()>,
}

/// Mutable state shared by the event listener, the timers and the
/// maintenance tick.
#[derive(Default)]
pub struct WatcherState {
    pending: HashMap<PathBuf, PendingChange>,
    last_processed: HashMap<PathBuf, Instant>,
    last_event_at: Option<DateTime<Local>>,
    next_generation: u64,
}

/// Coalesces raw events into [`WatchedChange`]s.
///
/// Cloning yields another handle to the same state. Must be used inside a
/// tokio runtime.
#[derive(Clone)]
pub struct ChangeDebouncer {
    state: Arc<Mutex<WatcherState>>,
    debounce: Duration,
    cooldown: Duration,
    tx: mpsc::UnboundedSender<WatchedChange>,
}

impl ChangeDebouncer {
    /// Create a debouncer and the receiver its changes are delivered to.
    pub fn new(debounce: Duration, cooldown: Duration) -> (Self, mpsc::UnboundedReceiver<WatchedChange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            state: Arc::new(Mutex::new(WatcherState::default())),
            debounce,
            cooldown,
            tx,
        };
        (debouncer, rx)
    }

    fn lock(&self) -> MutexGuard<'_, WatcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a raw event for `path`, restarting its debounce timer.
    pub fn ingest(&self, path: PathBuf, kind: ChangeKind) {
        let now = Local::now();
        let mut state = self.lock();
        state.last_event_at = Some(now);
        state.next_generation += 1;
        let generation = state.next_generation;

        if let Some(previous) = state.pending.remove(&path) {
            previous.timer.abort();
        }

        let this = self.clone();
        let timer_path = path.clone();
        let delay = self.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.fire(&timer_path, generation);
        });

        trace!(path = %path.display(), %kind, generation, "Debounce timer (re)started");
        state.pending.insert(
            path,
            PendingChange {
                generation,
                kind,
                detected_at: now,
                timer,
            },
        );
    }

    fn fire(&self, path: &Path, generation: u64) {
        let change = {
            let mut state = self.lock();
            match state.pending.get(path) {
                Some(p) if p.generation == generation => {}
                _ => return,
            }
            let Some(pending) = state.pending.remove(path) else {
                return;
            };

            let now = Instant::now();
            if let Some(last) = state.last_processed.get(path) {
                let elapsed = now.duration_since(*last);
                if elapsed < self.cooldown {
                    debug!(
                        path = %path.display(),
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Change suppressed by cooldown"
                    );
                    return;
                }
            }
            state.last_processed.insert(path.to_path_buf(), now);

            WatchedChange {
                path: path.to_path_buf(),
                kind: pending.kind,
                detected_at: pending.detected_at,
            }
        };

        debug!(path = %change.path.display(), kind = %change.kind, "Change detected");
        if self.tx.send(change).is_err() {
            debug!("Change receiver dropped");
        }
    }

    /// Emit one `Created` change per existing Office file under `root`.
    ///
    /// Bypasses the debounce delay; the emitted paths enter the cooldown
    /// window like any other emission. Returns the number of files found.
    pub fn scan_existing_files(&self, root: &Path, recursive: bool) -> usize {
        let mut walker = WalkDir::new(root).min_depth(1);
        if !recursive {
            walker = walker.max_depth(1);
        }

        let mut found = 0;
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Skipping unreadable entry during scan");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_watched_path(entry.path()) {
                continue;
            }

            let change = WatchedChange {
                path: entry.path().to_path_buf(),
                kind: ChangeKind::Created,
                detected_at: Local::now(),
            };
            self.lock()
                .last_processed
                .insert(change.path.clone(), Instant::now());
            if self.tx.send(change).is_err() {
                debug!("Change receiver dropped");
                break;
            }
            found += 1;
        }
        found
    }

    /// Drop cooldown entries older than the cooldown. Returns how many were
    /// removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let cooldown = self.cooldown;
        let mut state = self.lock();
        let before = state.last_processed.len();
        state
            .last_processed
            .retain(|_, last| now.duration_since(*last) < cooldown);
        before - state.last_processed.len()
    }

    /// Paths currently waiting for their debounce timer.
    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Paths currently inside their cooldown window.
    pub fn cooldown_count(&self) -> usize {
        self.lock().last_processed.len()
    }

    pub fn last_event_at(&self) -> Option<DateTime<Local>> {
        self.lock().last_event_at
    }

    /// Abort every pending timer and forget all state.
    pub fn clear(&self) {
        let mut state = self.lock();
        for (_, pending) in state.pending.drain() {
            pending.timer.abort();
        }
        state.last_processed.clear();
    }
}
