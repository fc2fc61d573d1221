//! OCR-tolerant term matching.
//!
//! A term is expanded into every rendering an OCR engine might plausibly
//! produce for it (`0`/`o`, `1`/`l`/`i`, `9`/`g`/`q`, ...), and a haystack
//! contains the term if it contains any of those renderings.

use std::collections::BTreeSet;

use tracing::{debug, warn};

/// Combination count above which expansion logs a warning.
pub const VARIANT_WARN_THRESHOLD: usize = 10_000;

/// Combination count above which expansion is skipped entirely.
pub const DEFAULT_VARIANT_CAP: usize = 100_000;

/// Characters an OCR engine confuses with `c` (case-folded, `c` included).
/// Empty when `c` has no confusion class.
fn confusion_class(c: char) -> &'static [char] {
    match c {
        '0' => &['0', 'o'],
        '1' => &['1', 'l', 'i'],
        'i' => &['i', 'l', '1'],
        'l' => &['l', 'i', '1'],
        '5' => &['5', 's'],
        '8' => &['8', 'b'],
        '9' => &['9', 'g', 'q'],
        '2' => &['2', 'z'],
        '6' => &['6', 'g', 'b'],
        _ => &[],
    }
}

/// Bounds on variant expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantLimits {
    /// Warn when the combination count exceeds this.
    pub warn_threshold: usize,
    /// Above this, only the case-folded term is used.
    pub hard_cap: usize,
}

impl Default for VariantLimits {
    fn default() -> Self {
        Self {
            warn_threshold: VARIANT_WARN_THRESHOLD,
            hard_cap: DEFAULT_VARIANT_CAP,
        }
    }
}

/// Fuzzy matcher with configurable expansion limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatcher {
    limits: VariantLimits,
}

impl FuzzyMatcher {
    pub fn new(limits: VariantLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> VariantLimits {
        self.limits
    }

    /// Case-folded term plus every OCR-confusable rendering, deduplicated and sorted.
    pub fn variants(&self, term: &str) -> Vec<String> {
        let folded = term.to_lowercase();
        let options: Vec<Vec<char>> = folded
            .chars()
            .map(|c| match confusion_class(c) {
                [] => vec![c],
                class => class.to_vec(),
            })
            .collect();

        let total = options
            .iter()
            .fold(1usize, |acc, opts| acc.saturating_mul(opts.len()));
        if total > self.limits.warn_threshold {
            warn!(
                "Large number of OCR variants for '{}' ({} combinations)",
                term, total
            );
        }
        if total > self.limits.hard_cap {
            warn!(
                "Skipping OCR variant expansion for '{}': {} combinations exceeds cap of {}",
                term, total, self.limits.hard_cap
            );
            return vec![folded];
        }

        let mut partial = vec![String::with_capacity(folded.len())];
        for opts in &options {
            let mut next = Vec::with_capacity(partial.len() * opts.len());
            for prefix in &partial {
                for &c in opts.iter() {
                    let mut s = prefix.clone();
                    s.push(c);
                    next.push(s);
                }
            }
            partial = next;
        }

        let mut set: BTreeSet<String> = partial.into_iter().collect();
        set.insert(folded);
        let variants: Vec<String> = set.into_iter().collect();
        debug!("Generated {} OCR variant(s) for '{}'", variants.len(), term);
        variants
    }

    /// Whether any variant of `term` occurs in `haystack` (case-insensitive).
    pub fn contains(&self, term: &str, haystack: &str) -> bool {
        self.contains_lowered(term, &haystack.to_lowercase())
    }

    /// Like [`contains`](Self::contains) for a haystack that is already lowercase.
    pub fn contains_lowered(&self, term: &str, lowered_haystack: &str) -> bool {
        if term.trim().is_empty() {
            return false;
        }
        self.variants(term)
            .iter()
            .any(|v| lowered_haystack.contains(v.as_str()))
    }

    /// The terms that fuzzy-occur in `haystack`, in input order.
    pub fn find_hits<'a, I>(&self, haystack: &str, terms: I) -> Vec<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let lowered = haystack.to_lowercase();
        let mut total = 0usize;
        let hits: Vec<&'a str> = terms
            .into_iter()
            .inspect(|_| total += 1)
            .filter(|term| {
                let hit = self.contains_lowered(term, &lowered);
                if hit {
                    debug!("Match found for term '{}'", term);
                }
                hit
            })
            .collect();
        debug!("Total hits found: {} / {}", hits.len(), total);
        hits
    }
}

/// Variants of `term` under the default limits.
pub fn variants(term: &str) -> Vec<String> {
    FuzzyMatcher::default().variants(term)
}

/// Fuzzy containment under the default limits.
pub fn contains(term: &str, haystack: &str) -> bool {
    FuzzyMatcher::default().contains(term, haystack)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variants_of_zero() {
        let v = variants("0");
        assert!(v.contains(&"0".to_string()));
        assert!(v.contains(&"o".to_string()));
    }

    #[test]
    fn test_variants_of_109() {
        let v = variants("109");
        for expected in ["109", "1o9", "l09", "i0q", "log"] {
            assert!(v.contains(&expected.to_string()), "missing {}", expected);
        }
        assert_eq!(v.len(), 3 * 2 * 3);
    }

    #[test]
    fn test_variants_are_lowercase_sorted_unique() {
        let v = variants("CCT-5B");
        assert!(v.iter().all(|s| s == &s.to_lowercase()));
        let mut sorted = v.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(v, sorted);
        assert!(v.contains(&"cct-5b".to_string()));
        assert!(v.contains(&"cct-sb".to_string()));
    }

    #[test]
    fn test_characters_without_class_map_to_themselves() {
        assert_eq!(variants("K"), vec!["k"]);
        assert_eq!(variants("é"), vec!["é"]);
    }

    #[test]
    fn test_contains_key_label() {
        assert!(contains("CCT", "cct: 3000k"));
        assert!(!contains("CRI", "cct: 3000k"));
    }

    #[test]
    fn test_contains_nine_as_g_or_q() {
        assert!(contains("9", "oranGe"));
        assert!(contains("9", "quad"));
        assert!(!contains("9", "abc"));
    }

    #[test]
    fn test_contains_ocr_confused_value() {
        // "3000K" read as "3OOOK"
        assert!(contains("3000K", "cct: 3OOOK nominal"));
    }

    #[test]
    fn test_short_numeric_value_false_positive_is_preserved() {
        // Substring containment: "2" is found inside "120".
        assert!(contains("2", "input 120v"));
    }

    #[test]
    fn test_empty_term_never_matches() {
        assert!(!contains("", "anything"));
        assert!(!contains("   ", "anything"));
    }

    #[test]
    fn test_hard_cap_falls_back_to_literal() {
        let matcher = FuzzyMatcher::new(VariantLimits {
            warn_threshold: 4,
            hard_cap: 10,
        });
        // 3 * 3 * 3 = 27 combinations > 10
        assert_eq!(matcher.variants("111"), vec!["111"]);
        assert!(!matcher.contains("111", "lll"));
        assert!(matcher.contains("111", "x111x"));
    }

    #[test]
    fn test_find_hits_keeps_input_order() {
        let matcher = FuzzyMatcher::default();
        let hits = matcher.find_hits("Recessed troffer, pendant", ["pendant", "wall", "recessed"]);
        assert_eq!(hits, vec!["pendant", "recessed"]);
    }
}
