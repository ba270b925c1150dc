//! PDF → Markdown synthesis with a Vision Language Model.
//!
//! Every page of the PDF is rasterised, PNG-encoded, and sent to the VLM as
//! an image attachment together with a system prompt from
//! [`crate::prompts`]. Pages are processed concurrently (bounded by
//! [`VisionConfig::concurrency`]) and reassembled in page order.
//!
//! ## Retry Strategy
//!
//! A failed call is retried with exponential backoff
//! (`retry_backoff_ms * 2^attempt`). A page that still fails after
//! `max_retries` fails the whole document: the caller sees one synthesis
//! error, never a half-written Markdown file.

use super::postprocess::clean_page;
use super::{pdfium, MarkdownRenderer};
use crate::config::{MarkdownOptions, VisionConfig};
use crate::error::{CollaboratorError, Office2MdError};
use crate::prompts::system_prompt;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Default [`MarkdownRenderer`] backed by a VLM.
pub struct VisionMarkdownRenderer {
    provider: Arc<dyn LLMProvider>,
    config: VisionConfig,
}

impl VisionMarkdownRenderer {
    /// Resolve the LLM provider and build the renderer.
    ///
    /// Fails with [`Office2MdError::ProviderNotConfigured`] when no provider
    /// can be constructed; that is a startup error, not a per-file one.
    pub fn new(config: VisionConfig) -> Result<Self, Office2MdError> {
        let provider = resolve_provider(&config)?;
        Ok(Self { provider, config })
    }

    /// Convert one page image into Markdown, retrying transient failures.
    async fn process_page(&self, page_num: usize, image: ImageData, prompt: &str) -> Result<String, String> {
        let messages = vec![
            ChatMessage::system(prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];
        let options = CompletionOptions {
            temperature: Some(self.config.temperature),
            max_tokens: Some(self.config.max_tokens),
            ..Default::default()
        };

        let start = Instant::now();
        let mut last_err = String::from("Unknown error");
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let backoff = backoff_ms(self.config.retry_backoff_ms, attempt);
                warn!(
                    "Page {}: retry {}/{} after {}ms",
                    page_num, attempt, self.config.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match self.provider.chat(&messages, Some(&options)).await {
                Ok(response) => {
                    debug!(
                        "Page {}: {} input tokens, {} output tokens, {:?}",
                        page_num,
                        response.prompt_tokens,
                        response.completion_tokens,
                        start.elapsed()
                    );
                    return Ok(clean_page(&response.content));
                }
                Err(e) => {
                    last_err = e.to_string();
                    warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, last_err);
                }
            }
        }

        Err(format!(
            "page {} failed after {} retries: {}",
            page_num, self.config.max_retries, last_err
        ))
    }
}

#[async_trait]
impl MarkdownRenderer for VisionMarkdownRenderer {
    async fn render(
        &self,
        pdf: &Path,
        output: &Path,
        options: MarkdownOptions,
    ) -> Result<PathBuf, CollaboratorError> {
        let start = Instant::now();
        let rendered = pdfium::render_pages(pdf, self.config.max_rendered_pixels).await?;
        if rendered.is_empty() {
            return Err(CollaboratorError::Synthesis(format!(
                "PDF '{}' has no pages",
                pdf.display()
            )));
        }

        let mut encoded = Vec::with_capacity(rendered.len());
        for (idx, img) in &rendered {
            let data = encode_page(img).map_err(|e| {
                CollaboratorError::Synthesis(format!("Image encoding failed for page {}: {e}", idx + 1))
            })?;
            encoded.push((idx + 1, data));
        }
        drop(rendered);

        let prompt = system_prompt(options);
        let total = encoded.len();
        let results: Vec<Result<String, String>> = stream::iter(
            encoded
                .into_iter()
                .map(|(page_num, data)| self.process_page(page_num, data, prompt)),
        )
        .buffered(self.config.concurrency.max(1))
        .collect()
        .await;

        let mut pages = Vec::with_capacity(total);
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(md) => pages.push(md),
                Err(e) => failures.push(e),
            }
        }
        if let Some(first) = failures.first() {
            return Err(CollaboratorError::Synthesis(format!(
                "{}/{} pages failed during Markdown conversion. First error: {}",
                failures.len(),
                total,
                first
            )));
        }

        let markdown = pages.join("\n");
        write_atomic(output, &markdown)
            .await
            .map_err(|e| CollaboratorError::Synthesis(e.to_string()))?;

        info!(
            pdf = %pdf.display(),
            output = %output.display(),
            pages = total,
            duration_ms = start.elapsed().as_millis() as u64,
            "Markdown written"
        );
        Ok(output.to_path_buf())
    }
}

/// Encode a rasterised page as a base64 PNG for the VLM request.
/// Delay before retry number `attempt` (1-based), doubling each time.
fn backoff_ms(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(ImageData::new(STANDARD.encode(&buf), "image/png").with_detail("high"))
}

/// Write to `<path>.tmp`, then rename over `path`.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), Office2MdError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Office2MdError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, contents)
        .await
        .map_err(|e| Office2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Office2MdError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}

fn create_vision_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Office2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Office2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. pre-built `config.provider`
/// 2. `config.provider_name` + `config.model`
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set
/// 4. `OPENAI_API_KEY` present → OpenAI
/// 5. `ProviderFactory::from_env` auto-detection
fn resolve_provider(config: &VisionConfig) -> Result<Arc<dyn LLMProvider>, Office2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Office2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, AZURE_OPENAI_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_page() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255])));
        let data = encode_page(&img).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn backoff_doubles_and_saturates() {
        assert_eq!(backoff_ms(500, 1), 500);
        assert_eq!(backoff_ms(500, 2), 1000);
        assert_eq!(backoff_ms(500, 4), 4000);
        assert_eq!(backoff_ms(500, 64), u64::MAX);
        assert_eq!(backoff_ms(500, u32::MAX), u64::MAX);
    }

    #[tokio::test]
    async fn atomic_write_creates_parent_and_leaves_no_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/report.md");
        write_atomic(&out, "# Report\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), "# Report\n");
        assert!(!out.with_extension("md.tmp").exists());
    }
}
