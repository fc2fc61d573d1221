//! Exact, word-aligned detection of schema keys in OCR lines.
//!
//! Keys are printed labels, so unlike values they are matched exactly:
//! a key hits a line when its lowercase word sequence appears as a
//! contiguous run of the line's words.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::ocr::{BBox, OcrDocument};

fn word_regex() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\w+").expect("static word pattern"))
}

/// Lowercase word units of `text`.
pub fn word_units(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    word_regex()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// One occurrence of a key in one OCR line.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyHit {
    pub key: String,
    /// Full text of the OCR line the key was found in.
    pub text: String,
    pub bbox: BBox,
    pub page_index: usize,
    pub token_index: usize,
    /// Bottom edge of the table region this hit sits in, once known.
    pub stop_y: Option<f32>,
}

impl KeyHit {
    /// A copy annotated with the bottom of its enclosing table region.
    pub fn with_stop_y(&self, stop_y: f32) -> Self {
        Self {
            stop_y: Some(stop_y),
            ..self.clone()
        }
    }
}

/// Result of scanning a document for keys.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyHits {
    /// Keys with at least one hit.
    pub matched_keys: BTreeSet<String>,
    /// Every occurrence, in page then line order.
    pub hits: Vec<KeyHit>,
}

/// Find every occurrence of every key in the document's OCR lines.
///
/// Each line contributes at most one hit per key; repeated lines each
/// contribute their own hit.
pub fn find_key_hits<'a, I>(keys: I, document: &OcrDocument) -> KeyHits
where
    I: IntoIterator<Item = &'a str>,
{
    let normalized: Vec<(Vec<String>, &str)> = keys
        .into_iter()
        .filter_map(|key| {
            let words = word_units(key);
            if words.is_empty() {
                debug!("Key '{}' has no word characters; it can never hit", key);
                None
            } else {
                Some((words, key))
            }
        })
        .collect();
    debug!("Searching for {} key(s) in OCR results", normalized.len());

    let mut result = KeyHits::default();
    for page_index in 0..document.page_count() {
        for token in document.page_tokens(page_index) {
            let words = word_units(&token.text);
            for (key_words, key) in &normalized {
                if words.len() < key_words.len() {
                    continue;
                }
                if words.windows(key_words.len()).any(|w| w == key_words.as_slice()) {
                    if result.matched_keys.insert(key.to_string()) {
                        debug!("Key matched: '{}' in OCR text '{}'", key, token.text);
                    }
                    result.hits.push(KeyHit {
                        key: key.to_string(),
                        text: token.text.clone(),
                        bbox: token.bbox,
                        page_index,
                        token_index: token.token_index,
                        stop_y: None,
                    });
                }
            }
        }
    }

    debug!(
        "Key search complete: {} unique key(s), {} hit(s)",
        result.matched_keys.len(),
        result.hits.len()
    );
    result
}
