//! Table-aware value recovery.
//!
//! Spec sheets often print a key as a column header with values in the
//! cells beneath it. For key hits that fall inside a detected table, the
//! text below the key (down to the table's bottom edge, within the key's
//! horizontal span) is collected and the attribute's values are re-tested
//! against that column alone.

use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use tracing::{debug, info};

use super::keys::KeyHit;
use crate::layout::{table_regions, LayoutDetector, LayoutError, TABLE_CLASS};
use crate::ocr::{BBox, OcrDocument, OcrToken};
use crate::verdict::Buckets;

/// Minimum share of the key's width a token must overlap to join its column.
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.3;

/// Geometry and labelling knobs for table extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableSettings {
    pub overlap_threshold: f32,
    pub table_class: u32,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            table_class: TABLE_CLASS,
        }
    }
}

/// Key hits belonging to attributes in `value_matched.matched`.
pub fn hits_for_value_matched(hits: &[KeyHit], value_matched: &Buckets) -> Vec<KeyHit> {
    hits.iter()
        .filter(|hit| {
            value_matched
                .matched
                .values()
                .any(|v| v.original_key == hit.key)
        })
        .cloned()
        .collect()
}

/// Smallest page range covering every hit.
pub fn page_span(hits: &[KeyHit]) -> Option<Range<usize>> {
    let min = hits.iter().map(|h| h.page_index).min()?;
    let max = hits.iter().map(|h| h.page_index).max()?;
    Some(min..max + 1)
}

/// Hits that intersect a table region on their page, each annotated with
/// the bottom edge of the first such region.
pub fn filter_hits_by_regions(
    hits: &[KeyHit],
    regions_by_page: &BTreeMap<usize, Vec<BBox>>,
) -> Vec<KeyHit> {
    hits.iter()
        .filter_map(|hit| {
            let region = regions_by_page
                .get(&hit.page_index)?
                .iter()
                .find(|region| hit.bbox.intersects(region))?;
            Some(hit.with_stop_y(region.y2))
        })
        .collect()
}

/// Tokens in the column beneath `key`, top to bottom.
///
/// A token qualifies when its top edge is strictly below the key's bottom
/// edge, strictly above `stop_y` (if any), and its horizontal overlap with
/// the key is at least `overlap_threshold` of the key's width.
pub fn column_under_key(
    key: &BBox,
    stop_y: Option<f32>,
    tokens: &[OcrToken],
    overlap_threshold: f32,
) -> Vec<OcrToken> {
    let key_width = key.width();
    if key_width <= 0.0 {
        return Vec::new();
    }
    let mut column: Vec<OcrToken> = tokens
        .iter()
        .filter(|t| t.bbox.y1 > key.y2)
        .filter(|t| stop_y.map_or(true, |stop| t.bbox.y1 < stop))
        .filter(|t| key.horizontal_overlap(&t.bbox) / key_width >= overlap_threshold)
        .cloned()
        .collect();
    column.sort_by(|a, b| a.bbox.y1.total_cmp(&b.bbox.y1));
    column
}

/// Lowercased column text per key, from every retained hit of that key.
pub fn column_text_by_key(
    hits: &[KeyHit],
    document: &OcrDocument,
    overlap_threshold: f32,
) -> BTreeMap<String, String> {
    let mut texts: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for hit in hits {
        let tokens = document.page_tokens(hit.page_index);
        let column = column_under_key(&hit.bbox, hit.stop_y, &tokens, overlap_threshold);
        debug!(
            "Column under '{}' on page {}: {} token(s)",
            hit.key,
            hit.page_index + 1,
            column.len()
        );
        texts
            .entry(hit.key.clone())
            .or_default()
            .extend(column.into_iter().map(|t| t.text));
    }
    texts
        .into_iter()
        .map(|(key, parts)| (key, parts.join(" ").to_lowercase()))
        .collect()
}

/// Re-test each value-matched attribute against its key's column text.
///
/// Values are plain case-insensitive substrings here, not OCR variants.
/// Attributes without a confirming column move to not-matched alongside
/// `value_matched.not_matched`.
pub fn match_values_for_keys(
    column_text: &BTreeMap<String, String>,
    value_matched: &Buckets,
) -> Buckets {
    let mut out = Buckets {
        matched: BTreeMap::new(),
        not_matched: value_matched.not_matched.clone(),
    };
    for verdict in value_matched.matched.values() {
        let text = column_text
            .get(&verdict.original_key)
            .map(String::as_str)
            .unwrap_or("");
        let values: BTreeMap<String, bool> = verdict
            .candidate_values
            .keys()
            .map(|v| {
                let needle = v.trim().to_lowercase();
                (v.clone(), !needle.is_empty() && text.contains(&needle))
            })
            .collect();
        let next = verdict.with_values(values);
        if next.has_hit() {
            out.insert_matched(next);
        } else {
            out.insert_not_matched(next);
        }
    }
    out
}

/// Runs the table strategy against a layout detector.
pub struct TableExtractor<'a> {
    detector: &'a dyn LayoutDetector,
    settings: TableSettings,
}

impl<'a> TableExtractor<'a> {
    pub fn new(detector: &'a dyn LayoutDetector, settings: TableSettings) -> Self {
        Self { detector, settings }
    }

    /// Table-derived verdicts for the attributes in `value_matched`.
    ///
    /// Layout detection runs only over the pages spanned by relevant hits.
    pub fn extract(
        &self,
        document: &Path,
        ocr: &OcrDocument,
        hits: &[KeyHit],
        value_matched: &Buckets,
    ) -> Result<Buckets, LayoutError> {
        let relevant = hits_for_value_matched(hits, value_matched);
        let Some(pages) = page_span(&relevant) else {
            debug!("No key hits for value-matched attributes; skipping table detection");
            return Ok(match_values_for_keys(&BTreeMap::new(), value_matched));
        };

        info!(
            "Detecting layout on pages {} to {} with {}",
            pages.start + 1,
            pages.end,
            self.detector.name()
        );
        let first_page = pages.start;
        let detections = self.detector.detect(document, pages)?;
        let regions = table_regions(&detections, first_page, self.settings.table_class);

        let in_tables = filter_hits_by_regions(&relevant, &regions);
        debug!("{} of {} key hit(s) fall inside tables", in_tables.len(), relevant.len());

        let columns = column_text_by_key(&in_tables, ocr, self.settings.overlap_threshold);
        let result = match_values_for_keys(&columns, value_matched);
        info!(
            "Table extraction: {} matched, {} not matched",
            result.matched.len(),
            result.not_matched.len()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Detection;
    use crate::ocr::{PageOcr, Polygon};
    use crate::verdict::AttributeVerdict;
    use crate::schema::AttributeDefinition;
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn token(text: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> OcrToken {
        OcrToken {
            text: text.to_string(),
            bbox: BBox::new(x1, y1, x2, y2),
            page_index: 0,
            token_index: 0,
        }
    }

    fn hit(key: &str, page_index: usize, bbox: BBox) -> KeyHit {
        KeyHit {
            key: key.to_string(),
            text: key.to_string(),
            bbox,
            page_index,
            token_index: 0,
            stop_y: None,
        }
    }

    fn value_matched(name: &str, values: &[&str]) -> Buckets {
        let def = AttributeDefinition::new("string", values, &["Troffer"]);
        let verdict =
            AttributeVerdict::from_definition(name, &def, &["Troffer".to_string()].into());
        let mut b = Buckets::new();
        b.insert_matched(verdict);
        b
    }

    #[test]
    fn test_column_geometry() {
        let key = BBox::new(100.0, 100.0, 200.0, 120.0);
        let tokens = vec![
            token("inside", 120.0, 150.0, 220.0, 170.0),
            token("above", 100.0, 80.0, 200.0, 95.0),
            token("below stop", 100.0, 310.0, 200.0, 330.0),
            token("side column", 185.0, 150.0, 300.0, 170.0),
            token("touching key", 100.0, 120.0, 200.0, 140.0),
        ];
        let column = column_under_key(&key, Some(300.0), &tokens, 0.3);
        let texts: Vec<_> = column.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["inside"]);
    }

    #[test]
    fn test_column_sorted_top_to_bottom_without_stop() {
        let key = BBox::new(0.0, 0.0, 100.0, 10.0);
        let tokens = vec![
            token("third", 0.0, 900.0, 100.0, 910.0),
            token("first", 0.0, 20.0, 100.0, 30.0),
            token("second", 0.0, 50.0, 100.0, 60.0),
        ];
        let texts: Vec<_> = column_under_key(&key, None, &tokens, 0.3)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_overlap_at_threshold_is_kept() {
        let key = BBox::new(0.0, 100.0, 100.0, 120.0);
        let tokens = vec![
            token("exactly 30%", 70.0, 130.0, 170.0, 150.0),
            token("29%", 71.0, 160.0, 171.0, 180.0),
        ];
        let texts: Vec<_> = column_under_key(&key, None, &tokens, 0.3)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["exactly 30%"]);
    }

    #[test]
    fn test_zero_width_key_collects_nothing() {
        let key = BBox::new(10.0, 0.0, 10.0, 10.0);
        let tokens = vec![token("x", 0.0, 20.0, 100.0, 30.0)];
        assert!(column_under_key(&key, None, &tokens, 0.3).is_empty());
    }

    #[test]
    fn test_filter_hits_by_regions_annotates_stop_y() {
        let regions: BTreeMap<usize, Vec<BBox>> = [(
            1,
            vec![
                BBox::new(0.0, 0.0, 50.0, 50.0),
                BBox::new(0.0, 90.0, 500.0, 300.0),
            ],
        )]
        .into();
        let hits = vec![
            hit("CCT", 1, BBox::new(100.0, 100.0, 200.0, 120.0)),
            hit("CCT", 0, BBox::new(100.0, 100.0, 200.0, 120.0)),
            hit("CRI", 1, BBox::new(600.0, 100.0, 700.0, 120.0)),
        ];
        let kept = filter_hits_by_regions(&hits, &regions);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].page_index, 1);
        assert_eq!(kept[0].stop_y, Some(300.0));
    }

    #[test]
    fn test_page_span() {
        let hits = vec![
            hit("a", 4, BBox::default()),
            hit("b", 2, BBox::default()),
        ];
        assert_eq!(page_span(&hits), Some(2..5));
        assert_eq!(page_span(&[]), None);
    }

    #[test]
    fn test_match_values_for_keys_is_plain_substring() {
        let vm = value_matched("CCT", &["3000K", "4000K"]);
        let columns: BTreeMap<String, String> =
            [("CCT".to_string(), "3000k 3500k".to_string())].into();
        let out = match_values_for_keys(&columns, &vm);
        let cct = &out.matched["CCT"];
        assert_eq!(cct.candidate_values["3000K"], true);
        assert_eq!(cct.candidate_values["4000K"], false);

        // OCR-confused text is not recovered by this strategy
        let columns: BTreeMap<String, String> =
            [("CCT".to_string(), "3oook".to_string())].into();
        let out = match_values_for_keys(&columns, &vm);
        assert!(out.not_matched.contains_key("CCT"));
    }

    struct RecordingDetector {
        detections: Vec<Vec<Detection>>,
        requested: Mutex<Vec<Range<usize>>>,
    }

    impl LayoutDetector for RecordingDetector {
        fn name(&self) -> &str {
            "recording"
        }

        fn detect(&self, _: &Path, pages: Range<usize>) -> Result<Vec<Vec<Detection>>, LayoutError> {
            self.requested.lock().unwrap().push(pages.clone());
            Ok(pages
                .map(|i| self.detections.get(i).cloned().unwrap_or_default())
                .collect())
        }
    }

    #[test]
    fn test_extractor_reads_column_inside_table() {
        let page = PageOcr::new(
            vec!["Cover".into(), "CCT".into(), "3000K".into(), "Notes 4000K".into()],
            vec![
                Polygon::from_rect(0.0, 0.0, 100.0, 20.0),
                Polygon::from_rect(100.0, 100.0, 200.0, 120.0),
                Polygon::from_rect(110.0, 150.0, 190.0, 170.0),
                Polygon::from_rect(100.0, 400.0, 200.0, 420.0),
            ],
        );
        let doc = OcrDocument::new(vec![PageOcr::default(), page]);
        let detector = RecordingDetector {
            detections: vec![
                vec![],
                vec![Detection::new(BBox::new(50.0, 90.0, 400.0, 300.0), TABLE_CLASS)],
            ],
            requested: Mutex::new(Vec::new()),
        };
        let hits = vec![
            hit("CCT", 1, BBox::new(100.0, 100.0, 200.0, 120.0)),
            hit("Other", 0, BBox::new(0.0, 0.0, 10.0, 10.0)),
        ];
        let vm = value_matched("CCT", &["3000K", "4000K"]);

        let out = TableExtractor::new(&detector, TableSettings::default())
            .extract(Path::new("doc"), &doc, &hits, &vm)
            .unwrap();

        assert_eq!(*detector.requested.lock().unwrap(), vec![1..2]);
        let cct = &out.matched["CCT"];
        assert_eq!(cct.candidate_values["3000K"], true);
        assert_eq!(cct.candidate_values["4000K"], false);
    }

    #[test]
    fn test_extractor_skips_detection_without_hits() {
        let detector = RecordingDetector {
            detections: vec![],
            requested: Mutex::new(Vec::new()),
        };
        let vm = value_matched("CCT", &["3000K"]);
        let out = TableExtractor::new(&detector, TableSettings::default())
            .extract(Path::new("doc"), &OcrDocument::default(), &[], &vm)
            .unwrap();
        assert!(detector.requested.lock().unwrap().is_empty());
        assert!(out.not_matched.contains_key("CCT"));
        let names: BTreeSet<_> = out.names();
        assert_eq!(names.len(), 1);
    }
}
