//! Layout-detection collaborator interface.
//!
//! A detector returns, for each requested page, a list of labelled boxes.
//! Only the table label matters to extraction; detectors trained with the
//! DocLayout label ordering use class `5` for tables.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ocr::BBox;

/// Class label of table regions in DocLayout-style detectors.
pub const TABLE_CLASS: u32 = 5;

/// Errors from layout detectors.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Layout detection failed: {0}")]
    DetectionFailed(String),

    #[error("Unreadable layout output in {path}: {reason}")]
    InvalidOutput { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One detected box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BBox,
    pub class: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Detection {
    pub fn new(bbox: BBox, class: u32) -> Self {
        Self {
            bbox,
            class,
            confidence: None,
        }
    }
}

/// Trait for layout detectors.
pub trait LayoutDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Detect regions on `pages` of `document`. Returns one summary per page
    /// in the range, in order.
    fn detect(
        &self,
        document: &Path,
        pages: Range<usize>,
    ) -> Result<Vec<Vec<Detection>>, LayoutError>;
}

/// Table boxes per page, from detections covering pages starting at `first_page`.
///
/// Boxes on a page are ordered top-to-bottom, then left-to-right; pages
/// without tables are omitted.
pub fn table_regions(
    detections: &[Vec<Detection>],
    first_page: usize,
    table_class: u32,
) -> BTreeMap<usize, Vec<BBox>> {
    let mut regions = BTreeMap::new();
    for (offset, page) in detections.iter().enumerate() {
        let mut tables: Vec<BBox> = page
            .iter()
            .filter(|d| d.class == table_class)
            .map(|d| d.bbox)
            .collect();
        if tables.is_empty() {
            continue;
        }
        tables.sort_by(|a, b| a.y1.total_cmp(&b.y1).then(a.x1.total_cmp(&b.x1)));
        regions.insert(first_page + offset, tables);
    }
    debug!("Detected tables on {} page(s)", regions.len());
    regions
}

/// Detector reading pre-computed detections from a JSON sidecar.
///
/// The sidecar is `layout.json` inside a document directory, or
/// `<stem>.layout.json` next to a document file. It holds one array of
/// detections per page. A missing sidecar means no regions anywhere.
#[derive(Debug, Clone, Default)]
pub struct JsonLayoutDetector;

impl JsonLayoutDetector {
    pub fn new() -> Self {
        Self
    }

    pub fn sidecar_path(document: &Path) -> PathBuf {
        if document.is_dir() {
            return document.join("layout.json");
        }
        let stem = document
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        document.with_file_name(format!("{}.layout.json", stem))
    }

    /// Whether `path` names a layout sidecar rather than OCR output.
    pub fn is_sidecar(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|n| n == "layout.json" || n.ends_with(".layout.json"))
            .unwrap_or(false)
    }
}

impl LayoutDetector for JsonLayoutDetector {
    fn name(&self) -> &str {
        "json-sidecar"
    }

    fn detect(
        &self,
        document: &Path,
        pages: Range<usize>,
    ) -> Result<Vec<Vec<Detection>>, LayoutError> {
        let path = Self::sidecar_path(document);
        if !path.exists() {
            debug!("No layout sidecar at {}", path.display());
            return Ok(vec![Vec::new(); pages.len()]);
        }

        let contents = std::fs::read_to_string(&path)?;
        let all: Vec<Option<Vec<Detection>>> =
            serde_json::from_str(&contents).map_err(|e| LayoutError::InvalidOutput {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        Ok(pages
            .map(|i| all.get(i).cloned().flatten().unwrap_or_default())
            .collect())
    }
}
