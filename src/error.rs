//! Error types for the office2md library.
//!
//! Three error types reflect three distinct failure modes:
//!
//! * [`Office2MdError`]: **Fatal**: infrastructure the converter cannot run
//!   without (working directories cannot be created, the filesystem watcher
//!   cannot bind, the configuration is invalid). Returned as `Err` from
//!   constructors and from the watch loop's entry points.
//!
//! * [`CollaboratorError`]: **Non-fatal**: one external capability (PDF
//!   render, PDF inspection, Markdown synthesis) failed for one file. The
//!   pipeline records it on the [`crate::task::ConversionTask`] and moves on.
//!
//! * [`TaskErrorKind`]: the closed classification stored on a finished task
//!   next to its human-readable message.
//!
//! Errors never escape the per-file boundary: a batch or a watch session
//! survives any number of failed files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the office2md library.
///
/// Per-file failures use [`CollaboratorError`] and are stored on the task
/// rather than propagated here.
#[derive(Debug, Error)]
pub enum Office2MdError {
    // ── Filesystem errors ─────────────────────────────────────────────────
    /// A required working directory could not be created.
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input directory could not be listed.
    #[error("Failed to scan directory '{path}': {detail}")]
    ScanFailed { path: PathBuf, detail: String },

    // ── Watcher errors ────────────────────────────────────────────────────
    /// The OS-level filesystem subscription could not be established.
    #[error("Failed to watch '{path}': {detail}")]
    WatchFailed { path: PathBuf, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// A failure reported by one of the external capabilities.
///
/// The `Display` output is the collaborator's message verbatim so that a
/// task's `error_message` reads exactly what the renderer said.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollaboratorError {
    /// Office → PDF rendering failed (including its internal fallbacks).
    #[error("{0}")]
    Render(String),

    /// The PDF could not be opened or a page could not be read.
    #[error("{0}")]
    Inspect(String),

    /// PDF → Markdown synthesis failed.
    #[error("{0}")]
    Synthesis(String),
}

/// Why a task ended somewhere other than `COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskErrorKind {
    /// Unsupported extension or missing input file.
    Validation,
    /// The render capability failed or produced nothing.
    RenderFailure,
    /// Protected content was detected; a placeholder was written instead.
    ProtectionWarning,
    /// The Markdown capability failed.
    SynthesisFailure,
    /// Anything else, including panics caught at the batch or watch boundary.
    Unexpected,
}

impl TaskErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskErrorKind::Validation => "validation",
            TaskErrorKind::RenderFailure => "render_failure",
            TaskErrorKind::ProtectionWarning => "protection_warning",
            TaskErrorKind::SynthesisFailure => "synthesis_failure",
            TaskErrorKind::Unexpected => "unexpected",
        }
    }
}

impl std::fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
