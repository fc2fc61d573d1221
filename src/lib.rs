//! specsift - attribute extraction from OCR'd technical spec sheets.
//!
//! Given a declarative attribute schema and the OCR output of a scanned spec
//! sheet, decides per attribute whether it applies to the document, whether
//! its key is printed, which candidate values appear, and whether key and
//! value really belong together. Two independent strategies (a text funnel
//! and a spatial table reader) are merged into one verdict per attribute.
//!
//! OCR, layout detection and the LLM are injected collaborators; see
//! [`ocr::OcrEngine`], [`layout::LayoutDetector`] and [`llm::TextGenerator`].

pub mod cache;
pub mod config;
pub mod guidance;
pub mod layout;
pub mod llm;
pub mod matching;
pub mod ocr;
pub mod pipeline;
pub mod schema;
pub mod verdict;

pub use pipeline::{BatchSummary, DocumentOutcome, Pipeline, PipelineError};
pub use schema::{AttributeDefinition, Schema, SchemaError};
pub use verdict::{AttributeVerdict, Buckets};
