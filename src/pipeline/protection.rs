//! Rights-management detection on rendered PDFs.
//!
//! A PDF counts as protected when its container is encrypted or when one of
//! its leading pages carries a known rights-management phrase. Inspection
//! failures never count as protection: an unreadable PDF is passed on to the
//! Markdown stage rather than silently replaced by a placeholder.

use crate::backend::PdfInspector;
use crate::config::ConverterConfig;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Classifies a PDF as protected or open.
#[derive(Clone)]
pub struct ProtectionDetector {
    inspector: Arc<dyn PdfInspector>,
    markers: Vec<String>,
    page_limit: usize,
}

impl ProtectionDetector {
    /// Detector using the markers and page limit from `config`.
    pub fn new(inspector: Arc<dyn PdfInspector>, config: &ConverterConfig) -> Self {
        Self {
            inspector,
            markers: config.protection_markers.clone(),
            page_limit: config.protection_pages.max(1),
        }
    }

    /// Whether `pdf` is protected. Never fails.
    pub async fn is_protected(&self, pdf: &Path) -> bool {
        let inspection = match self.inspector.inspect(pdf, self.page_limit).await {
            Ok(i) => i,
            Err(e) => {
                warn!(pdf = %pdf.display(), error = %e, "PDF inspection failed, treating as unprotected");
                return false;
            }
        };

        if inspection.is_encrypted {
            debug!(pdf = %pdf.display(), "PDF is encrypted");
            return true;
        }

        for (idx, page) in inspection.page_texts.iter().take(self.page_limit).enumerate() {
            let text = match page {
                Ok(t) => t.to_lowercase(),
                Err(e) => {
                    debug!(pdf = %pdf.display(), page = idx + 1, error = %e, "Skipping unreadable page");
                    continue;
                }
            };
            if let Some(marker) = self.markers.iter().find(|m| text.contains(m.as_str())) {
                debug!(pdf = %pdf.display(), page = idx + 1, %marker, "Protection marker found");
                return true;
            }
        }

        false
    }
}
