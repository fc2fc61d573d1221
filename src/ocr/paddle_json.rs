//! OCR engine backed by PaddleOCR's saved JSON results.
//!
//! PaddleOCR pipelines can persist each page's prediction with
//! `save_to_json`, producing objects with `rec_texts` and `rec_polys`
//! (sometimes nested under `res`). This engine reads those results so the
//! extraction core can run without an in-process OCR model.
//!
//! Accepted inputs:
//! - a directory of per-page JSON files (`page_1_res.json`, ...), ordered by page number
//! - a JSON file holding an array of pages
//! - a JSON file holding `{ "pages": [...] }` or a single page object

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use super::backend::{OcrDocument, OcrEngine, OcrError, PageOcr};
use crate::layout::JsonLayoutDetector;

/// Reads pre-computed PaddleOCR JSON output.
#[derive(Debug, Clone, Default)]
pub struct PaddleJsonEngine;

impl PaddleJsonEngine {
    pub fn new() -> Self {
        Self
    }

    fn read_json(path: &Path) -> Result<Value, OcrError> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| OcrError::InvalidOutput {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Convert one page value. `null` is an empty page, not an error; an
    /// object must carry `rec_texts` or a `res` wrapper.
    fn page_from_value(value: Value, path: &Path) -> Result<PageOcr, OcrError> {
        let value = match value {
            Value::Null => return Ok(PageOcr::default()),
            Value::Array(mut group) => {
                // Paddle's predict() returns a list with one result per image.
                if group.is_empty() {
                    return Ok(PageOcr::default());
                }
                group.swap_remove(0)
            }
            other => other,
        };
        let value = match value {
            Value::Object(mut map) if map.contains_key("res") => {
                map.remove("res").unwrap_or(Value::Null)
            }
            other => other,
        };
        match value {
            Value::Null => return Ok(PageOcr::default()),
            Value::Object(ref map) if !map.contains_key("rec_texts") => {
                return Err(OcrError::InvalidOutput {
                    path: path.display().to_string(),
                    reason: "page has no \"rec_texts\"".to_string(),
                });
            }
            _ => {}
        }
        serde_json::from_value(value).map_err(|e| OcrError::InvalidOutput {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn pages_from_file(path: &Path) -> Result<Vec<PageOcr>, OcrError> {
        match Self::read_json(path)? {
            Value::Array(pages) => pages
                .into_iter()
                .map(|p| Self::page_from_value(p, path))
                .collect(),
            Value::Object(mut map) if map.contains_key("pages") => {
                match map.remove("pages").unwrap_or(Value::Null) {
                    Value::Array(pages) => pages
                        .into_iter()
                        .map(|p| Self::page_from_value(p, path))
                        .collect(),
                    _ => Err(OcrError::InvalidOutput {
                        path: path.display().to_string(),
                        reason: "\"pages\" must be an array".to_string(),
                    }),
                }
            }
            single => Ok(vec![Self::page_from_value(single, path)?]),
        }
    }

    fn pages_from_dir(dir: &Path) -> Result<Vec<PageOcr>, OcrError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_page_file(p))
            .collect();
        files.sort_by_key(|p| page_sort_key(p));

        debug!("Reading {} OCR page file(s) from {}", files.len(), dir.display());
        files
            .iter()
            .map(|f| Self::page_from_value(Self::read_json(f)?, f))
            .collect()
    }
}

/// JSON files in a document directory, excluding layout sidecars.
fn is_page_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    path.is_file() && name.ends_with(".json") && !JsonLayoutDetector::is_sidecar(path)
}

/// Order page files by the last number in their stem, then by name.
fn page_sort_key(path: &Path) -> (u64, String) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let number = stem
        .split(|c: char| !c.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .last()
        .and_then(|s| s.parse().ok())
        .unwrap_or(u64::MAX);
    (number, stem)
}

impl OcrEngine for PaddleJsonEngine {
    fn name(&self) -> &str {
        "paddle-json"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "Reads PaddleOCR results saved with save_to_json; always available".to_string()
    }

    fn recognize(&self, document: &Path) -> Result<OcrDocument, OcrError> {
        let pages = if document.is_dir() {
            Self::pages_from_dir(document)?
        } else if document.is_file() {
            Self::pages_from_file(document)?
        } else {
            return Err(OcrError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("OCR input not found: {}", document.display()),
            )));
        };
        Ok(OcrDocument::new(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PAGE: &str = r#"{
        "input_path": "page.png",
        "rec_texts": ["CCT", "3000K"],
        "rec_polys": [[[10, 10], [50, 10], [50, 20], [10, 20]], [[10, 40], [50, 40], [50, 50], [10, 50]]]
    }"#;

    #[test]
    fn test_directory_pages_in_numeric_order() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sheet_10_res.json"), r#"{"rec_texts": ["ten"], "rec_polys": [[[0,0],[1,1]]]}"#).unwrap();
        std::fs::write(dir.path().join("sheet_2_res.json"), r#"{"res": {"rec_texts": ["two"], "rec_polys": [[[0,0],[1,1]]]}}"#).unwrap();
        std::fs::write(dir.path().join("layout.json"), "[]").unwrap();

        let doc = PaddleJsonEngine::new().recognize(dir.path()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages[0].rec_texts, vec!["two"]);
        assert_eq!(doc.pages[1].rec_texts, vec!["ten"]);
    }

    #[test]
    fn test_file_with_page_array_keeps_empty_pages() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, format!("[{}, null, [{}]]", PAGE, PAGE)).unwrap();

        let doc = PaddleJsonEngine::new().recognize(&path).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert!(doc.pages[1].is_empty());
        assert_eq!(doc.pages[2].rec_texts, vec!["CCT", "3000K"]);
        assert_eq!(doc.page_tokens(0)[1].bbox.y1, 40.0);
    }

    #[test]
    fn test_file_with_pages_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, format!(r#"{{"pages": [{}]}}"#, PAGE)).unwrap();
        let doc = PaddleJsonEngine::new().recognize(&path).unwrap();
        assert_eq!(doc.full_text(), "cct 3000k");
    }

    #[test]
    fn test_invalid_json_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, "{broken").unwrap();
        let err = PaddleJsonEngine::new().recognize(&path).unwrap_err();
        assert!(matches!(err, OcrError::InvalidOutput { .. }));
    }

    #[test]
    fn test_layout_sidecar_is_not_a_page() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sheet.layout.json");
        std::fs::write(
            &path,
            r#"[[{"box": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}, "class": 5}]]"#,
        )
        .unwrap();
        let err = PaddleJsonEngine::new().recognize(&path).unwrap_err();
        assert!(matches!(err, OcrError::InvalidOutput { .. }));

        std::fs::write(&path, r#"{"box": {"x1": 0, "y1": 0, "x2": 10, "y2": 10}}"#).unwrap();
        assert!(PaddleJsonEngine::new().recognize(&path).is_err());
    }

    #[test]
    fn test_missing_input() {
        let err = PaddleJsonEngine::new()
            .recognize(Path::new("/nonexistent/doc.json"))
            .unwrap_err();
        assert!(matches!(err, OcrError::Io(_)));
    }
}
