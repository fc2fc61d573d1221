//! OCR collaborator abstraction and the recognised-document model.
//!
//! The core never runs OCR itself. An [`OcrEngine`] hands back, per page,
//! the recognised strings and their polygons (`rec_texts` / `rec_polys`).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::geometry::{BBox, Polygon};

/// Errors from OCR engines.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("OCR engine not available: {0}")]
    EngineNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("Unreadable OCR output in {path}: {reason}")]
    InvalidOutput { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// OCR output for one page. Missing fields mean "no text on this page".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageOcr {
    #[serde(default)]
    pub rec_texts: Vec<String>,
    #[serde(default)]
    pub rec_polys: Vec<Polygon>,
}

impl PageOcr {
    pub fn new(rec_texts: Vec<String>, rec_polys: Vec<Polygon>) -> Self {
        Self {
            rec_texts,
            rec_polys,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rec_texts.is_empty()
    }

    /// Tokens for this page. Texts without a polygon are dropped.
    pub fn tokens(&self, page_index: usize) -> Vec<OcrToken> {
        self.rec_texts
            .iter()
            .zip(&self.rec_polys)
            .enumerate()
            .map(|(token_index, (text, poly))| OcrToken {
                text: text.clone(),
                bbox: poly.bbox(),
                page_index,
                token_index,
            })
            .collect()
    }
}

/// One recognised text span.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub bbox: BBox,
    pub page_index: usize,
    pub token_index: usize,
}

/// Every page of one document, in page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OcrDocument {
    pub pages: Vec<PageOcr>,
}

impl OcrDocument {
    pub fn new(pages: Vec<PageOcr>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All tokens of one page (empty when the page does not exist).
    pub fn page_tokens(&self, page_index: usize) -> Vec<OcrToken> {
        self.pages
            .get(page_index)
            .map(|p| p.tokens(page_index))
            .unwrap_or_default()
    }

    /// Whole-document lowercase text: tokens joined by spaces, pages likewise.
    pub fn full_text(&self) -> String {
        let text = self
            .pages
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| p.rec_texts.join(" "))
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        tracing::debug!("Built full OCR text ({} characters)", text.len());
        text
    }
}

/// Trait for OCR engines.
pub trait OcrEngine: Send + Sync {
    /// Short engine name for logs.
    fn name(&self) -> &str;

    /// Check if this engine can run (dependencies installed, inputs present).
    fn is_available(&self) -> bool;

    /// Describe what is needed to make this engine available.
    fn availability_hint(&self) -> String;

    /// Recognise every page of a document.
    fn recognize(&self, document: &Path) -> Result<OcrDocument, OcrError>;
}
