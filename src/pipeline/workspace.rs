//! Intermediate working area.
//!
//! ```text
//! <intermediate_dir>/
//! └── pdf/
//!     ├── report/      PDFs rendered from report.docx
//!     └── budget/      PDFs rendered from budget.xlsx
//! ```
//!
//! Each input gets a subdirectory named after its stem. Inputs that share a
//! stem (`report.docx` and `report.xlsx`) share that directory and the
//! `<stem>.md` output, so the later render overwrites the earlier one;
//! [`Workspace::claim`] reports the collision. The `pdf/` tree is purged
//! only when a pipeline is constructed.

use std::collections::HashMap;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Handle to the intermediate working area.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    /// Last input rendered into each stem directory since the last purge.
    claims: Mutex<HashMap<OsString, PathBuf>>,
}

impl Workspace {
    pub fn new(intermediate_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: intermediate_dir.into(),
            claims: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pdf_root(&self) -> PathBuf {
        self.root.join("pdf")
    }

    /// `<root>/pdf/<stem of input>`
    pub fn pdf_dir_for(&self, input: &Path) -> PathBuf {
        self.pdf_root().join(stem_of(input))
    }

    /// Record that `input` is about to render into its stem directory.
    ///
    /// Returns the previous, different input that used the same directory.
    /// Re-rendering the same input is not a collision.
    pub fn claim(&self, input: &Path) -> Option<PathBuf> {
        let mut claims = self.claims.lock().unwrap_or_else(PoisonError::into_inner);
        claims
            .insert(stem_of(input), input.to_path_buf())
            .filter(|previous| previous != input)
    }

    /// Remove the whole `pdf/` tree. A missing tree is not an error.
    pub fn purge(&self) -> io::Result<()> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner).clear();
        match std::fs::remove_dir_all(self.pdf_root()) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

fn stem_of(input: &Path) -> OsString {
    input
        .file_stem()
        .map(|s| s.to_os_string())
        .unwrap_or_else(|| "unnamed".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_dir_is_named_after_stem() {
        let ws = Workspace::new("/tmp/work");
        assert_eq!(
            ws.pdf_dir_for(Path::new("/in/Budget 2024.xlsx")),
            PathBuf::from("/tmp/work/pdf/Budget 2024")
        );
    }

    #[test]
    fn shared_stem_is_reported_as_collision() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let docx = Path::new("/in/report.docx");
        let xlsx = Path::new("/in/report.xlsx");

        assert_eq!(ws.claim(docx), None);
        assert_eq!(ws.claim(docx), None);
        assert_eq!(ws.claim(xlsx), Some(docx.to_path_buf()));
        assert_eq!(ws.claim(Path::new("/in/budget.xlsx")), None);
        assert_eq!(ws.pdf_dir_for(docx), ws.pdf_dir_for(xlsx));

        ws.purge().unwrap();
        assert_eq!(ws.claim(docx), None);
    }

    #[test]
    fn purge_removes_pdf_tree_only() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let artifact_dir = ws.pdf_dir_for(Path::new("report.docx"));
        std::fs::create_dir_all(&artifact_dir).unwrap();
        std::fs::write(artifact_dir.join("report.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        ws.purge().unwrap();
        assert!(!ws.pdf_root().exists());
        assert!(dir.path().join("keep.txt").exists());

        // Purging an already-empty area succeeds.
        ws.purge().unwrap();
    }
}
