//! Per-document extraction and batch processing.
//!
//! For each document: recognise text, detect product types, split the
//! schema, locate keys, run the funnel, run table recovery, merge, persist.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::guidance::GuidanceSet;
use crate::layout::{LayoutDetector, LayoutError};
use crate::matching::{
    find_key_hits, match_product_types, merge_results, split_schema_by_product_type_match,
    Funnel, FunnelStages, FuzzyMatcher, KeyHits, ProductTypeLookup, TableExtractor,
    TableSettings,
};
use crate::ocr::{OcrDocument, OcrEngine, OcrError};
use crate::schema::Schema;
use crate::verdict::Buckets;

/// Inputs whose funnel confirmed at least one attribute.
pub const SUCCESS_DIR: &str = "success_found";
/// Inputs with no confirmed attribute.
pub const NOT_FOUND_DIR: &str = "not_found";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("OCR failed for {}: {source}", document.display())]
    Ocr {
        document: PathBuf,
        source: OcrError,
    },

    #[error("Layout detection failed for {}: {source}", document.display())]
    Layout {
        document: PathBuf,
        source: LayoutError,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything derived from one document's OCR.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub matched_product_types: BTreeSet<String>,
    pub key_hits: KeyHits,
    pub funnel: FunnelStages,
    pub table: Buckets,
    pub merged: Buckets,
}

impl Extraction {
    /// Success means the funnel confirmed at least one attribute.
    pub fn is_success(&self) -> bool {
        !self.funnel.result().matched.is_empty()
    }
}

/// Result of processing one document.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub document: PathBuf,
    pub output_path: PathBuf,
    pub extraction: Extraction,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.extraction.is_success()
    }

    /// Attributes in the final matched bucket.
    pub fn matched_attributes(&self) -> Vec<&str> {
        self.extraction
            .merged
            .matched
            .keys()
            .map(String::as_str)
            .collect()
    }
}

/// Tally of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<PathBuf>,
    pub no_match: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.no_match.len() + self.failed.len()
    }
}

/// Extraction pipeline with its collaborators and loaded inputs.
pub struct Pipeline {
    ocr: Box<dyn OcrEngine>,
    layout: Box<dyn LayoutDetector>,
    schema: Schema,
    lookup: ProductTypeLookup,
    guidance: GuidanceSet,
    matcher: FuzzyMatcher,
    table: TableSettings,
    output_dir: PathBuf,
    sort_inputs: bool,
}

impl Pipeline {
    pub fn new(
        ocr: Box<dyn OcrEngine>,
        layout: Box<dyn LayoutDetector>,
        schema: Schema,
        lookup: ProductTypeLookup,
        guidance: GuidanceSet,
        settings: &Settings,
    ) -> Self {
        Self {
            ocr,
            layout,
            schema,
            lookup,
            guidance,
            matcher: FuzzyMatcher::new(settings.variant_limits),
            table: settings.table,
            output_dir: settings.output_dir.clone(),
            sort_inputs: settings.sort_inputs,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Run matching over already-recognised text.
    pub fn extract(&self, document: &Path, ocr: &OcrDocument) -> Result<Extraction, LayoutError> {
        let full_text = ocr.full_text();

        let matched_product_types = match_product_types(&full_text, &self.lookup, &self.matcher);
        let partition = split_schema_by_product_type_match(&self.schema, &matched_product_types);

        let applicable_keys: Vec<&str> = partition
            .matched
            .values()
            .map(|v| v.original_key.as_str())
            .collect();
        let key_hits = find_key_hits(applicable_keys, ocr);

        let funnel = Funnel::new(&self.matcher, &self.guidance).run(
            &partition,
            &key_hits.matched_keys,
            &full_text,
        );

        let table = TableExtractor::new(self.layout.as_ref(), self.table).extract(
            document,
            ocr,
            &key_hits.hits,
            &funnel.value_matched,
        )?;

        let merged = merge_results([funnel.result(), &table]);
        Ok(Extraction {
            matched_product_types,
            key_hits,
            funnel,
            table,
            merged,
        })
    }

    /// Recognise, extract and persist one document.
    pub fn process_document(&self, document: &Path) -> Result<DocumentOutcome, PipelineError> {
        info!("Processing {}", document.display());
        let ocr = self
            .ocr
            .recognize(document)
            .map_err(|source| PipelineError::Ocr {
                document: document.to_path_buf(),
                source,
            })?;
        debug!("{} page(s) recognised by {}", ocr.page_count(), self.ocr.name());

        let extraction = self
            .extract(document, &ocr)
            .map_err(|source| PipelineError::Layout {
                document: document.to_path_buf(),
                source,
            })?;

        let output_path = self.save_result(document, &extraction.merged)?;
        Ok(DocumentOutcome {
            document: document.to_path_buf(),
            output_path,
            extraction,
        })
    }

    /// Write `final_result_<name>.json` with both buckets merged.
    fn save_result(&self, document: &Path, merged: &Buckets) -> Result<PathBuf, PipelineError> {
        let path = self
            .output_dir
            .join(format!("final_result_{}.json", document_name(document)));
        let json = serde_json::to_string_pretty(&merged.clone().into_result())?;
        std::fs::create_dir_all(&self.output_dir).map_err(|source| PipelineError::Output {
            path: self.output_dir.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| PipelineError::Output {
            path: path.clone(),
            source,
        })?;
        info!("Saved final result to {}", path.display());
        Ok(path)
    }

    /// Process every input in order. A failing document is recorded and
    /// the batch moves on.
    pub fn run_batch<F>(&self, inputs: &[PathBuf], mut on_document: F) -> BatchSummary
    where
        F: FnMut(&Path, &Result<DocumentOutcome, PipelineError>),
    {
        let mut summary = BatchSummary::default();
        for input in inputs {
            let result = self.process_document(input);
            on_document(input, &result);
            match result {
                Ok(outcome) => {
                    let success = outcome.is_success();
                    if self.sort_inputs {
                        let bucket = if success { SUCCESS_DIR } else { NOT_FOUND_DIR };
                        if let Err(e) = copy_into(input, &self.output_dir.join(bucket)) {
                            warn!("Could not sort {}: {}", input.display(), e);
                        }
                    }
                    if success {
                        summary.succeeded.push(input.clone());
                    } else {
                        info!("No confirmed attributes in {}", input.display());
                        summary.no_match.push(input.clone());
                    }
                }
                Err(e) => {
                    error!("Failed to process {}: {}", input.display(), e);
                    summary.failed.push((input.clone(), e.to_string()));
                }
            }
        }
        info!(
            "Batch complete: {} succeeded, {} without match, {} failed",
            summary.succeeded.len(),
            summary.no_match.len(),
            summary.failed.len()
        );
        summary
    }
}

/// Base name used for a document's output file.
pub fn document_name(document: &Path) -> String {
    let name = if document.is_dir() {
        document.file_name()
    } else {
        document.file_stem()
    };
    name.and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string()
}

/// Copy a file, or a directory's files, into `dest_dir`.
fn copy_into(input: &Path, dest_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest_dir)?;
    let Some(name) = input.file_name() else {
        return Ok(());
    };
    let target = dest_dir.join(name);
    if input.is_dir() {
        std::fs::create_dir_all(&target)?;
        for entry in std::fs::read_dir(input)? {
            let path = entry?.path();
            if path.is_file() {
                if let Some(file_name) = path.file_name() {
                    std::fs::copy(&path, target.join(file_name))?;
                }
            }
        }
    } else {
        std::fs::copy(input, target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::JsonLayoutDetector;
    use crate::matching::MountingTerms;
    use crate::ocr::PaddleJsonEngine;
    use crate::schema::AttributeDefinition;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn pipeline(output_dir: &Path, sort_inputs: bool) -> Pipeline {
        let mut attrs = BTreeMap::new();
        attrs.insert(
            "CCT".to_string(),
            AttributeDefinition::new("string", &["3000K", "4000K"], &["Troffer"]),
        );
        let mut lookup = ProductTypeLookup::new();
        lookup.insert("Troffer".into(), MountingTerms::One("recessed".into()));
        let settings = Settings {
            output_dir: output_dir.to_path_buf(),
            sort_inputs,
            ..Settings::default()
        };
        Pipeline::new(
            Box::new(PaddleJsonEngine::new()),
            Box::new(JsonLayoutDetector::new()),
            Schema::from_attributes(attrs),
            lookup,
            GuidanceSet::new(),
            &settings,
        )
    }

    fn write_doc(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
        let polys: Vec<String> = (0..texts.len())
            .map(|i| {
                let y = i * 30;
                format!("[[0,{}],[100,{}],[100,{}],[0,{}]]", y, y, y + 20, y + 20)
            })
            .collect();
        let page = serde_json::json!({
            "rec_texts": texts,
            "rec_polys": serde_json::from_str::<serde_json::Value>(&format!("[{}]", polys.join(","))).unwrap(),
        });
        let path = dir.join(name);
        std::fs::write(&path, serde_json::to_string(&vec![page]).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_document_name() {
        assert_eq!(document_name(Path::new("/x/sheet.json")), "sheet");
        let dir = tempdir().unwrap();
        assert_eq!(
            document_name(dir.path()),
            dir.path().file_name().unwrap().to_str().unwrap()
        );
    }

    #[test]
    fn test_process_document_writes_merged_result() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let doc = write_doc(input.path(), "sheet.json", &["Recessed Troffer", "CCT: 3000K"]);

        let outcome = pipeline(output.path(), false).process_document(&doc).unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.matched_attributes(), vec!["CCT"]);
        assert_eq!(outcome.output_path, output.path().join("final_result_sheet.json"));

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&outcome.output_path).unwrap()).unwrap();
        assert_eq!(saved["CCT"]["values"]["3000K"], true);
        assert_eq!(saved["CCT"]["values"]["4000K"], false);
    }

    #[test]
    fn test_batch_isolates_failures_and_sorts() {
        let input = tempdir().unwrap();
        let output = tempdir().unwrap();
        let good = write_doc(input.path(), "good.json", &["recessed", "CCT 4000K"]);
        let miss = write_doc(input.path(), "miss.json", &["pendant", "CCT 4000K"]);
        let broken = input.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let missing = input.path().join("missing.json");

        let p = pipeline(output.path(), true);
        let mut seen = 0;
        let summary = p.run_batch(
            &[good.clone(), broken.clone(), miss.clone(), missing.clone()],
            |_, _| seen += 1,
        );

        assert_eq!(seen, 4);
        assert_eq!(summary.total(), 4);
        assert_eq!(summary.succeeded, vec![good]);
        assert_eq!(summary.no_match, vec![miss]);
        assert_eq!(summary.failed.len(), 2);
        assert!(output.path().join(SUCCESS_DIR).join("good.json").exists());
        assert!(output.path().join(NOT_FOUND_DIR).join("miss.json").exists());
        // No-match documents still get a persisted result
        assert!(output.path().join("final_result_miss.json").exists());
    }
}
