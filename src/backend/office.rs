//! Office → PDF rendering through a headless office suite.
//!
//! Each configured program (by default `soffice`, then `libreoffice`) is
//! invoked as
//!
//! ```text
//! <program> --headless --convert-to pdf --outdir <out_dir> <input>
//! ```
//!
//! until one of them leaves `<out_dir>/<stem>.pdf` behind. A missing binary,
//! a non-zero exit, a timeout, or an exit without output all move on to the
//! next program. If every program fails the error lists each attempt.

use super::PdfRenderer;
use crate::config::{is_office_file, OfficeRendererConfig};
use crate::error::CollaboratorError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default [`PdfRenderer`] backed by LibreOffice.
#[derive(Debug, Clone, Default)]
pub struct OfficeRenderer {
    config: OfficeRendererConfig,
}

impl OfficeRenderer {
    pub fn new(config: OfficeRendererConfig) -> Self {
        Self { config }
    }

    /// Run one program and return the produced PDF.
    async fn try_program(&self, program: &str, input: &Path, out_dir: &Path) -> Result<PathBuf, String> {
        let expected = expected_pdf(input, out_dir)?;
        let start = Instant::now();
        // A PDF left over from an earlier run must not count as output.
        let _ = tokio::fs::remove_file(&expected).await;

        let mut cmd = Command::new(program);
        cmd.arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(out_dir)
            .arg(input)
            .kill_on_drop(true);

        let output = tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), cmd.output())
            .await
            .map_err(|_| format!("timed out after {}s", self.config.timeout_secs))?
            .map_err(|e| format!("failed to start: {e}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("exited with {}: {}", output.status, stderr.trim()));
        }

        if !expected.exists() {
            return Err("no PDF was produced".to_string());
        }

        let size = tokio::fs::metadata(&expected).await.map(|m| m.len()).unwrap_or(0);
        info!(
            program = %program,
            input = %input.display(),
            bytes = size,
            duration_ms = start.elapsed().as_millis() as u64,
            "PDF rendered"
        );
        Ok(expected)
    }
}

#[async_trait]
impl PdfRenderer for OfficeRenderer {
    async fn render(&self, input: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, CollaboratorError> {
        if !is_office_file(input) {
            let ext = input
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Err(CollaboratorError::Render(format!("Unsupported extension: .{ext}")));
        }

        let mut failures = Vec::with_capacity(self.config.programs.len());
        for program in &self.config.programs {
            debug!(program = %program, input = %input.display(), "Trying PDF renderer");
            match self.try_program(program, input, out_dir).await {
                Ok(pdf) => return Ok(vec![pdf]),
                Err(reason) => {
                    warn!(program = %program, %reason, "PDF renderer failed, trying next");
                    failures.push(format!("{program}: {reason}"));
                }
            }
        }

        if failures.is_empty() {
            return Err(CollaboratorError::Render(
                "PDF conversion failed: no renderer programs configured".to_string(),
            ));
        }
        Err(CollaboratorError::Render(format!(
            "PDF conversion failed for '{}': {}",
            input.display(),
            failures.join("; ")
        )))
    }
}

/// `<out_dir>/<input stem>.pdf`
fn expected_pdf(input: &Path, out_dir: &Path) -> Result<PathBuf, String> {
    let stem = input
        .file_stem()
        .ok_or_else(|| format!("input has no file name: {}", input.display()))?;
    let mut name = stem.to_os_string();
    name.push(".pdf");
    Ok(out_dir.join(name))
}
