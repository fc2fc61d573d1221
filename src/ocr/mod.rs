//! OCR collaborator interface and recognised-text model.
//!
//! Recognition itself is external. Engines implement [`OcrEngine`]:
//! - **paddle-json**: reads PaddleOCR results saved as JSON (default)
//!
//! Geometry helpers live in [`geometry`] and are shared with layout detection.

mod backend;
pub mod geometry;
mod paddle_json;

pub use backend::{OcrDocument, OcrEngine, OcrError, OcrToken, PageOcr};
pub use geometry::{BBox, Polygon};
pub use paddle_json::PaddleJsonEngine;
