//! End-to-end extraction over in-memory OCR and layout collaborators.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use specsift::config::Settings;
use specsift::guidance::{GuidanceSet, RegexGuidance};
use specsift::layout::{Detection, LayoutDetector, LayoutError, TABLE_CLASS};
use specsift::matching::{merge_results, MountingTerms, ProductTypeLookup};
use specsift::ocr::{BBox, OcrDocument, OcrEngine, OcrError, PageOcr, Polygon};
use specsift::{AttributeDefinition, Buckets, Pipeline, Schema};

/// Serves the same pages for every document.
struct FixedOcr {
    pages: Vec<Vec<(&'static str, [f32; 4])>>,
}

impl OcrEngine for FixedOcr {
    fn name(&self) -> &str {
        "fixed"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    fn recognize(&self, document: &Path) -> Result<OcrDocument, OcrError> {
        if document.to_string_lossy().contains("unreadable") {
            return Err(OcrError::OcrFailed("unreadable scan".into()));
        }
        let pages = self
            .pages
            .iter()
            .map(|tokens| {
                let texts = tokens.iter().map(|(t, _)| t.to_string()).collect();
                let polys = tokens
                    .iter()
                    .map(|(_, [x1, y1, x2, y2])| Polygon::from_rect(*x1, *y1, *x2, *y2))
                    .collect();
                PageOcr::new(texts, polys)
            })
            .collect();
        Ok(OcrDocument::new(pages))
    }
}

/// Reports fixed tables on every page and records requested ranges.
struct FixedLayout {
    tables: Vec<BBox>,
    calls: Arc<Mutex<Vec<Range<usize>>>>,
}

impl FixedLayout {
    fn new(tables: Vec<BBox>) -> Self {
        Self {
            tables,
            calls: Arc::default(),
        }
    }
}

impl LayoutDetector for FixedLayout {
    fn name(&self) -> &str {
        "fixed"
    }

    fn detect(&self, _document: &Path, pages: Range<usize>) -> Result<Vec<Vec<Detection>>, LayoutError> {
        self.calls.lock().unwrap().push(pages.clone());
        Ok(pages
            .map(|_| {
                self.tables
                    .iter()
                    .map(|b| Detection::new(*b, TABLE_CLASS))
                    .collect()
            })
            .collect())
    }
}

fn schema() -> Schema {
    let mut attrs = BTreeMap::new();
    attrs.insert(
        "CCT".to_string(),
        AttributeDefinition::new("string", &["3000K", "4000K"], &["Troffer"]),
    );
    attrs.insert(
        "Lumens".to_string(),
        AttributeDefinition::new("string", &["4000lm", "5000lm"], &["Troffer"]),
    );
    attrs.insert(
        "Cord Length".to_string(),
        AttributeDefinition::new("string", &["6ft"], &["Pendant"]),
    );
    Schema::from_attributes(attrs)
}

fn lookup() -> ProductTypeLookup {
    let mut lookup = ProductTypeLookup::new();
    lookup.insert("Troffer".into(), MountingTerms::One("recessed".into()));
    lookup.insert(
        "Pendant".into(),
        MountingTerms::Many(vec!["pendant".into(), "suspended".into()]),
    );
    lookup
}

fn spec_sheet() -> Vec<Vec<(&'static str, [f32; 4])>> {
    vec![vec![
        ("Recessed Troffer", [0.0, 0.0, 200.0, 20.0]),
        ("CCT: 3000K", [0.0, 40.0, 200.0, 60.0]),
        ("Lumens", [0.0, 100.0, 100.0, 120.0]),
        ("Wattage", [200.0, 100.0, 300.0, 120.0]),
        ("4000lm", [0.0, 130.0, 100.0, 150.0]),
        ("30W", [200.0, 130.0, 300.0, 150.0]),
        ("Footnote 5000lm", [0.0, 260.0, 200.0, 280.0]),
    ]]
}

fn settings(output_dir: &Path) -> Settings {
    Settings {
        output_dir: output_dir.to_path_buf(),
        ..Settings::default()
    }
}

fn pipeline(output_dir: &Path, layout: FixedLayout, guidance: GuidanceSet) -> Pipeline {
    Pipeline::new(
        Box::new(FixedOcr {
            pages: spec_sheet(),
        }),
        Box::new(layout),
        schema(),
        lookup(),
        guidance,
        &settings(output_dir),
    )
}

fn table_layout() -> FixedLayout {
    FixedLayout::new(vec![BBox::new(0.0, 90.0, 400.0, 200.0)])
}

#[test]
fn test_funnel_confirms_key_value_pair() {
    let out = tempfile::tempdir().unwrap();
    let p = pipeline(out.path(), table_layout(), GuidanceSet::new());
    let ocr = FixedOcr {
        pages: spec_sheet(),
    }
    .recognize(Path::new("sheet.json"))
    .unwrap();

    let extraction = p.extract(Path::new("sheet.json"), &ocr).unwrap();
    assert!(extraction.matched_product_types.contains("Troffer"));
    assert!(!extraction.matched_product_types.contains("Pendant"));
    assert!(extraction.is_success());

    let cct = &extraction.funnel.result().matched["CCT"];
    assert_eq!(cct.candidate_values["3000K"], true);
    assert_eq!(cct.candidate_values["4000K"], false);
    assert_eq!(cct.product_type_status["Troffer"], true);

    // Not applicable: never reaches key search
    assert!(extraction.funnel.key_matched.not_matched.contains_key("Cord Length"));
    assert!(!extraction.key_hits.matched_keys.contains("Cord Length"));
}

#[test]
fn test_table_recovers_value_below_header() {
    let out = tempfile::tempdir().unwrap();
    let p = pipeline(out.path(), table_layout(), GuidanceSet::new());
    let ocr = FixedOcr {
        pages: spec_sheet(),
    }
    .recognize(Path::new("sheet.json"))
    .unwrap();

    let extraction = p.extract(Path::new("sheet.json"), &ocr).unwrap();

    // The header is not followed by its value in reading order
    assert!(extraction.funnel.value_matched.matched.contains_key("Lumens"));
    assert!(extraction.funnel.result().not_matched.contains_key("Lumens"));

    let lumens = &extraction.table.matched["Lumens"];
    assert_eq!(lumens.candidate_values["4000lm"], true);
    // Below the table's bottom edge
    assert_eq!(lumens.candidate_values["5000lm"], false);

    // CCT's key sits above the table, so the table has no opinion on it
    assert!(extraction.table.not_matched.contains_key("CCT"));
    assert!(extraction.merged.matched.contains_key("CCT"));
    assert!(extraction.merged.matched.contains_key("Lumens"));
    assert!(extraction.merged.not_matched.contains_key("Cord Length"));
}

#[test]
fn test_merge_never_unmatches() {
    let out = tempfile::tempdir().unwrap();
    let p = pipeline(out.path(), FixedLayout::new(Vec::new()), GuidanceSet::new());
    let ocr = FixedOcr {
        pages: spec_sheet(),
    }
    .recognize(Path::new("sheet.json"))
    .unwrap();

    let extraction = p.extract(Path::new("sheet.json"), &ocr).unwrap();
    assert!(extraction.table.matched.is_empty());
    for name in extraction.funnel.result().matched.keys() {
        assert!(extraction.merged.is_matched(name));
    }
    assert_eq!(
        extraction.merged.len(),
        extraction.funnel.result().len()
    );

    let again = merge_results([&extraction.table, extraction.funnel.result()]);
    assert_eq!(again.matched, extraction.merged.matched);
    let empty: [&Buckets; 0] = [];
    assert!(merge_results(empty).is_empty());
}

#[test]
fn test_layout_runs_only_on_hit_pages() {
    let out = tempfile::tempdir().unwrap();
    let layout = table_layout();
    let calls = Arc::clone(&layout.calls);
    let mut pages = vec![vec![("Recessed Troffer", [0.0, 0.0, 200.0, 20.0])]];
    pages.extend(spec_sheet());
    pages.push(vec![("Warranty", [0.0, 0.0, 100.0, 20.0])]);
    let ocr = FixedOcr { pages };
    let doc = ocr.recognize(Path::new("sheet.json")).unwrap();

    let p = Pipeline::new(
        Box::new(ocr),
        Box::new(layout),
        schema(),
        lookup(),
        GuidanceSet::new(),
        &settings(out.path()),
    );
    let extraction = p.extract(Path::new("sheet.json"), &doc).unwrap();

    assert!(extraction.key_hits.hits.iter().all(|h| h.page_index == 1));
    assert_eq!(*calls.lock().unwrap(), vec![1..2]);
    assert!(extraction.table.matched.contains_key("Lumens"));
}

#[test]
fn test_regex_guidance_overrides_literal_pair() {
    let out = tempfile::tempdir().unwrap();
    let mut guidance = GuidanceSet::new();
    guidance.insert("Lumens", RegexGuidance::pattern(r"lumens\s+wattage\s+(\d+lm)"));
    let p = pipeline(out.path(), FixedLayout::new(Vec::new()), guidance);
    let ocr = FixedOcr {
        pages: spec_sheet(),
    }
    .recognize(Path::new("sheet.json"))
    .unwrap();

    let extraction = p.extract(Path::new("sheet.json"), &ocr).unwrap();
    let lumens = &extraction.funnel.result().matched["Lumens"];
    assert_eq!(lumens.candidate_values["4000lm"], true);
    assert_eq!(lumens.candidate_values["5000lm"], false);
}

#[test]
fn test_batch_writes_results_and_isolates_failures() {
    let out = tempfile::tempdir().unwrap();
    let p = pipeline(out.path(), table_layout(), GuidanceSet::new());
    let inputs = vec![
        PathBuf::from("first.json"),
        PathBuf::from("unreadable.json"),
        PathBuf::from("second.json"),
    ];

    let summary = p.run_batch(&inputs, |_, _| {});
    assert_eq!(summary.succeeded.len(), 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, PathBuf::from("unreadable.json"));

    let saved: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(out.path().join("final_result_first.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved["CCT"]["values"]["3000K"], true);
    assert_eq!(saved["Lumens"]["values"]["4000lm"], true);
    assert_eq!(saved["Cord Length"]["values"]["6ft"], false);
    assert_eq!(saved["Cord Length"]["product_types"]["Pendant"], false);
    assert!(out.path().join("final_result_second.json").exists());
}
