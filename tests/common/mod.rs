//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use office2md::{
    Backends, CollaboratorError, ConversionPipeline, ConverterConfig, MarkdownOptions, MarkdownRenderer,
    PdfInspection, PdfInspector, PdfRenderer,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn stem(path: &Path) -> String {
    path.file_stem().unwrap().to_string_lossy().into_owned()
}

fn name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

// ── Renderer ─────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Render {
    Pdfs(usize),
    Empty,
    Fail(String),
    Panic(String),
}

#[derive(Default)]
pub struct FakeRenderer {
    behaviours: HashMap<String, Render>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeRenderer {
    /// Behaviour for the input with this file name. Default: one PDF.
    pub fn with(mut self, file_name: &str, behaviour: Render) -> Self {
        self.behaviours.insert(file_name.to_string(), behaviour);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PdfRenderer for FakeRenderer {
    async fn render(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, CollaboratorError> {
        self.calls.lock().unwrap().push(input.to_path_buf());
        let behaviour = self.behaviours.get(&name(input)).cloned().unwrap_or(Render::Pdfs(1));
        match behaviour {
            Render::Pdfs(n) => {
                let mut out = Vec::new();
                for i in 0..n {
                    let pdf = if i == 0 {
                        out_dir.join(format!("{}.pdf", stem(input)))
                    } else {
                        out_dir.join(format!("{}-{}.pdf", stem(input), i + 1))
                    };
                    tokio::fs::write(&pdf, b"%PDF-1.7 fake").await.unwrap();
                    out.push(pdf);
                }
                Ok(out)
            }
            Render::Empty => Ok(Vec::new()),
            Render::Fail(msg) => Err(CollaboratorError::Render(msg)),
            Render::Panic(msg) => panic!("{msg}"),
        }
    }
}

// ── Inspector ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub enum Inspect {
    Encrypted,
    Pages(Vec<Result<String, String>>),
    Fail(String),
}

#[derive(Default)]
pub struct FakeInspector {
    behaviours: HashMap<String, Inspect>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    /// Behaviour for the PDF with this file name. Default: one open page.
    pub fn with(mut self, pdf_name: &str, behaviour: Inspect) -> Self {
        self.behaviours.insert(pdf_name.to_string(), behaviour);
        self
    }
}

#[async_trait]
impl PdfInspector for FakeInspector {
    async fn inspect(&self, pdf: &Path, page_limit: usize) -> Result<PdfInspection, CollaboratorError> {
        self.calls.lock().unwrap().push(pdf.to_path_buf());
        let behaviour = self
            .behaviours
            .get(&name(pdf))
            .cloned()
            .unwrap_or_else(|| Inspect::Pages(vec![Ok("Quarterly results".into())]));
        match behaviour {
            Inspect::Encrypted => Ok(PdfInspection {
                is_encrypted: true,
                page_texts: Vec::new(),
            }),
            Inspect::Pages(pages) => Ok(PdfInspection {
                is_encrypted: false,
                page_texts: pages
                    .into_iter()
                    .take(page_limit)
                    .map(|p| p.map_err(CollaboratorError::Inspect))
                    .collect(),
            }),
            Inspect::Fail(msg) => Err(CollaboratorError::Inspect(msg)),
        }
    }
}

// ── Markdown ─────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeMarkdown {
    failures: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    pub calls: Mutex<Vec<(PathBuf, MarkdownOptions)>>,
}

impl FakeMarkdown {
    /// Fail synthesis for the PDF with this file name.
    pub fn failing(mut self, pdf_name: &str, msg: &str) -> Self {
        self.failures.insert(pdf_name.to_string(), msg.to_string());
        self
    }

    /// Sleep before writing the Markdown for this PDF.
    pub fn delayed(mut self, pdf_name: &str, delay: Duration) -> Self {
        self.delays.insert(pdf_name.to_string(), delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl MarkdownRenderer for FakeMarkdown {
    async fn render(
        &self,
        pdf: &Path,
        output: &Path,
        options: MarkdownOptions,
    ) -> Result<PathBuf, CollaboratorError> {
        self.calls.lock().unwrap().push((pdf.to_path_buf(), options));
        if let Some(delay) = self.delays.get(&name(pdf)) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(msg) = self.failures.get(&name(pdf)) {
            return Err(CollaboratorError::Synthesis(msg.clone()));
        }
        tokio::fs::write(output, format!("# {}\n", stem(pdf))).await.unwrap();
        Ok(output.to_path_buf())
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

/// Route library logs to the test output (`cargo test -- --nocapture`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("office2md=debug"))
        .with_test_writer()
        .try_init();
}

pub struct Fixture {
    pub dir: TempDir,
    pub renderer: Arc<FakeRenderer>,
    pub inspector: Arc<FakeInspector>,
    pub markdown: Arc<FakeMarkdown>,
}

impl Fixture {
    pub fn new(renderer: FakeRenderer, inspector: FakeInspector, markdown: FakeMarkdown) -> Self {
        init_tracing();
        Self {
            dir: tempfile::tempdir().unwrap(),
            renderer: Arc::new(renderer),
            inspector: Arc::new(inspector),
            markdown: Arc::new(markdown),
        }
    }

    pub fn plain() -> Self {
        Self::new(FakeRenderer::default(), FakeInspector::default(), FakeMarkdown::default())
    }

    pub fn input_dir(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn intermediate_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Create an input file and return its path.
    pub fn touch(&self, file_name: &str) -> PathBuf {
        let dir = self.input_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        std::fs::write(&path, b"office bytes").unwrap();
        path
    }

    pub fn backends(&self) -> Backends {
        Backends {
            renderer: self.renderer.clone(),
            inspector: self.inspector.clone(),
            markdown: self.markdown.clone(),
        }
    }

    pub fn config(&self) -> ConverterConfig {
        ConverterConfig::builder()
            .intermediate_dir(self.intermediate_dir())
            .build()
            .unwrap()
    }

    pub fn pipeline(&self) -> ConversionPipeline {
        self.pipeline_with(self.config())
    }

    pub fn pipeline_with(&self, config: ConverterConfig) -> ConversionPipeline {
        ConversionPipeline::new(config, self.backends()).unwrap()
    }
}
