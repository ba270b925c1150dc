//! Folder monitoring.
//!
//! Raw `notify` events are classified into [`ChangeKind`]s, filtered down to
//! Office files, and fed into a [`ChangeDebouncer`], which turns each burst of
//! events for one path into a single [`WatchedChange`]. The [`WatchLoop`]
//! owns the OS subscription and hands `Created`/`Modified` changes to the
//! conversion pipeline.
//!
//! ```text
//! notify ──▶ classify ──▶ ChangeDebouncer ──▶ WatchedChange ──▶ WatchLoop ──▶ ConversionPipeline
//!            (filter)     (debounce, cooldown)
//! ```

pub mod debouncer;
pub mod watch_loop;

pub use debouncer::ChangeDebouncer;
pub use watch_loop::{WatchLoop, WatchStatistics};

use crate::config::{is_lock_file, is_office_file};
use chrono::{DateTime, Local};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Type of a coalesced change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl ChangeKind {
    /// Whether this change should start a conversion.
    pub fn triggers_conversion(&self) -> bool {
        matches!(self, ChangeKind::Created | ChangeKind::Modified)
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
            ChangeKind::Renamed => "renamed",
        })
    }
}

/// One debounced change for one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    /// Time of the most recent raw event in the burst.
    pub detected_at: DateTime<Local>,
}

/// Whether changes to `path` are of interest.
pub fn is_watched_path(path: &Path) -> bool {
    is_office_file(path) && !is_lock_file(path)
}

/// Map a raw notify event to `(path, kind)` pairs.
///
/// A rename reports its source as `Renamed` and its destination as
/// `Created`: Office applications save by renaming a temp file over the
/// target, and that target must still be converted.
pub fn classify(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let single = |kind: ChangeKind| event.paths.iter().map(|p| (p.clone(), kind)).collect();
    match event.kind {
        EventKind::Create(_) => single(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => single(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(event.paths.len());
            let mut paths = event.paths.iter();
            if let Some(from) = paths.next() {
                out.push((from.clone(), ChangeKind::Renamed));
            }
            out.extend(paths.map(|to| (to.clone(), ChangeKind::Created)));
            out
        }
        EventKind::Modify(ModifyKind::Name(_)) => single(ChangeKind::Renamed),
        EventKind::Modify(_) => single(ChangeKind::Modified),
        EventKind::Remove(_) => single(ChangeKind::Deleted),
        _ => Vec::new(),
    }
}
