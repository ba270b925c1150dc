//! Configuration types for Office-to-Markdown conversion.
//!
//! The converter is controlled through four plain structs:
//!
//! * [`ConverterConfig`]: the pipeline itself (working area, Markdown
//!   options, protection heuristics, batch concurrency).
//! * [`WatchConfig`]: folder monitoring (directories, debounce, cooldown).
//! * [`OfficeRendererConfig`]: the default Office → PDF renderer.
//! * [`VisionConfig`]: the default PDF → Markdown renderer.
//!
//! The first two are built via builders that validate their constraints;
//! the renderer configs are simple enough to construct directly.

use crate::error::Office2MdError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// File extensions (lower-case, with dot) the pipeline accepts.
pub const OFFICE_EXTENSIONS: &[&str] = &[".docx", ".doc", ".xlsx", ".xls", ".pptx", ".ppt"];

/// Phrases whose presence in a page's lower-cased text marks the PDF as
/// rights-managed. Matching is substring-based.
pub const DEFAULT_PROTECTION_MARKERS: &[&str] = &[
    "microsoft information protection",
    "azure rights management",
    "このドキュメントでは、microsoft information protection",
    "rights management",
    "暗号化が使用されています",
];

/// Label used in logs and in the placeholder document when protection is found.
pub const PROTECTION_LABEL: &str = "Microsoft Information Protection";

/// Whether `path` has a recognised Office extension (case-insensitive).
pub fn is_office_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let dotted = format!(".{}", e.to_ascii_lowercase());
            OFFICE_EXTENSIONS.contains(&dotted.as_str())
        })
        .unwrap_or(false)
}

/// Whether `path` is an Office owner/lock file (`~$report.docx`).
pub fn is_lock_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with("~$"))
        .unwrap_or(false)
}

// ── Pipeline config ──────────────────────────────────────────────────────

/// Options forwarded to the Markdown capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownOptions {
    /// Ask the synthesiser to keep headings, tables and lists. Default: true.
    pub preserve_structure: bool,
}

impl Default for MarkdownOptions {
    fn default() -> Self {
        Self {
            preserve_structure: true,
        }
    }
}

/// Configuration for [`crate::pipeline::ConversionPipeline`] and
/// [`crate::batch::BatchOrchestrator`].
///
/// # Example
/// ```rust
/// use office2md::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .intermediate_dir("/tmp/office2md")
///     .batch_concurrency(4)
///     .build()
///     .unwrap();
/// assert_eq!(config.batch_concurrency, 4);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Root of the intermediate working area. PDF artifacts live under
    /// `<intermediate_dir>/pdf/<input stem>/`. Default: `<temp>/office_converter`.
    pub intermediate_dir: PathBuf,

    /// Options passed to every Markdown synthesis call.
    pub markdown: MarkdownOptions,

    /// Number of files a batch converts at once. Default: 1.
    ///
    /// Results are always reported in input order regardless of this value.
    pub batch_concurrency: usize,

    /// Lower-case marker phrases that classify a PDF as protected.
    pub protection_markers: Vec<String>,

    /// How many leading pages are scanned for markers. Default: 3.
    pub protection_pages: usize,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            intermediate_dir: std::env::temp_dir().join("office_converter"),
            markdown: MarkdownOptions::default(),
            batch_concurrency: 1,
            protection_markers: DEFAULT_PROTECTION_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            protection_pages: 3,
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn intermediate_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.intermediate_dir = dir.into();
        self
    }

    pub fn markdown(mut self, options: MarkdownOptions) -> Self {
        self.config.markdown = options;
        self
    }

    pub fn preserve_structure(mut self, v: bool) -> Self {
        self.config.markdown.preserve_structure = v;
        self
    }

    pub fn batch_concurrency(mut self, n: usize) -> Self {
        self.config.batch_concurrency = n.max(1);
        self
    }

    /// Replace the marker set. Markers are lower-cased on insert.
    pub fn protection_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.protection_markers = markers
            .into_iter()
            .map(|m| m.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn protection_pages(mut self, n: usize) -> Self {
        self.config.protection_pages = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, Office2MdError> {
        let c = &self.config;
        if c.intermediate_dir.as_os_str().is_empty() {
            return Err(Office2MdError::InvalidConfig(
                "intermediate directory must not be empty".into(),
            ));
        }
        if c.protection_pages == 0 {
            return Err(Office2MdError::InvalidConfig(
                "protection_pages must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Watch config ─────────────────────────────────────────────────────────

/// Configuration for [`crate::watch::WatchLoop`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to monitor. Created on start if missing.
    pub input_dir: PathBuf,

    /// Directory that receives the Markdown output.
    pub output_dir: PathBuf,

    /// Watch all subdirectories of `input_dir`. Default: false.
    pub recursive: bool,

    /// Quiet period a path needs before its change is emitted. Default: 2 s.
    ///
    /// Office applications save through temp files and renames, so a single
    /// "save" produces a burst of events spread over a second or more.
    pub debounce: Duration,

    /// Minimum time between two emissions for the same path. Default: 10 s.
    pub cooldown: Duration,

    /// Maintenance tick of the main loop. Default: 1 s.
    pub tick_interval: Duration,
}

impl WatchConfig {
    /// Create a builder for the given input and output directories.
    pub fn builder(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> WatchConfigBuilder {
        WatchConfigBuilder {
            config: WatchConfig {
                input_dir: input_dir.into(),
                output_dir: output_dir.into(),
                recursive: false,
                debounce: Duration::from_secs(2),
                cooldown: Duration::from_secs(10),
                tick_interval: Duration::from_secs(1),
            },
        }
    }
}

/// Builder for [`WatchConfig`].
#[derive(Debug)]
pub struct WatchConfigBuilder {
    config: WatchConfig,
}

impl WatchConfigBuilder {
    pub fn recursive(mut self, v: bool) -> Self {
        self.config.recursive = v;
        self
    }

    pub fn debounce(mut self, d: Duration) -> Self {
        self.config.debounce = d;
        self
    }

    pub fn cooldown(mut self, d: Duration) -> Self {
        self.config.cooldown = d;
        self
    }

    pub fn tick_interval(mut self, d: Duration) -> Self {
        self.config.tick_interval = d;
        self
    }

    pub fn build(self) -> Result<WatchConfig, Office2MdError> {
        let c = &self.config;
        if c.debounce.is_zero() {
            return Err(Office2MdError::InvalidConfig(
                "debounce must be greater than zero".into(),
            ));
        }
        if c.tick_interval.is_zero() {
            return Err(Office2MdError::InvalidConfig(
                "tick interval must be greater than zero".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Renderer configs ─────────────────────────────────────────────────────

/// Configuration for [`crate::backend::office::OfficeRenderer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficeRendererConfig {
    /// Programs tried in order. The first that produces a PDF wins.
    pub programs: Vec<String>,

    /// Wall-clock limit for one program invocation. Default: 300 s.
    pub timeout_secs: u64,
}

impl Default for OfficeRendererConfig {
    fn default() -> Self {
        Self {
            programs: vec!["soffice".into(), "libreoffice".into()],
            timeout_secs: 300,
        }
    }
}

/// Configuration for [`crate::backend::vision::VisionMarkdownRenderer`].
#[derive(Clone)]
pub struct VisionConfig {
    /// LLM model identifier. If None, uses `gpt-4.1-nano`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "azure", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 4096.
    pub max_tokens: usize,

    /// Retries per page on a failed VLM call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Concurrent VLM calls per document. Default: 5.
    pub concurrency: usize,

    /// Longest edge of a rendered page image in pixels. Default: 2000.
    pub max_rendered_pixels: u32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.1,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            concurrency: 5,
            max_rendered_pixels: 2000,
        }
    }
}

impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("concurrency", &self.concurrency)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn office_extensions_case_insensitive() {
        assert!(is_office_file(Path::new("report.docx")));
        assert!(is_office_file(Path::new("REPORT.DOCX")));
        assert!(is_office_file(Path::new("/a/b/sheet.Xls")));
        assert!(is_office_file(Path::new("deck.ppt")));
        assert!(!is_office_file(Path::new("notes.txt")));
        assert!(!is_office_file(Path::new("archive.pdf")));
        assert!(!is_office_file(Path::new("no_extension")));
    }

    #[test]
    fn lock_files_are_detected() {
        assert!(is_lock_file(Path::new("/in/~$report.docx")));
        assert!(!is_lock_file(Path::new("/in/report.docx")));
    }

    #[test]
    fn converter_defaults() {
        let c = ConverterConfig::default();
        assert_eq!(c.batch_concurrency, 1);
        assert_eq!(c.protection_pages, 3);
        assert_eq!(c.protection_markers.len(), DEFAULT_PROTECTION_MARKERS.len());
        assert!(c.markdown.preserve_structure);
        assert!(c.intermediate_dir.ends_with("office_converter"));
    }

    #[test]
    fn builder_clamps_concurrency_and_lowercases_markers() {
        let c = ConverterConfig::builder()
            .batch_concurrency(0)
            .protection_markers(["Top SECRET"])
            .build()
            .unwrap();
        assert_eq!(c.batch_concurrency, 1);
        assert_eq!(c.protection_markers, vec!["top secret".to_string()]);
    }

    #[test]
    fn builder_rejects_zero_protection_pages() {
        let err = ConverterConfig::builder().protection_pages(0).build();
        assert!(matches!(err, Err(Office2MdError::InvalidConfig(_))));
    }

    #[test]
    fn watch_builder_defaults_and_validation() {
        let c = WatchConfig::builder("in", "out").build().unwrap();
        assert!(!c.recursive);
        assert_eq!(c.debounce, Duration::from_secs(2));
        assert_eq!(c.cooldown, Duration::from_secs(10));
        assert_eq!(c.tick_interval, Duration::from_secs(1));

        let err = WatchConfig::builder("in", "out")
            .debounce(Duration::ZERO)
            .build();
        assert!(matches!(err, Err(Office2MdError::InvalidConfig(_))));
    }
}
