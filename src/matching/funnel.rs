//! Three-stage narrowing of applicable attributes.
//!
//! 1. key presence: the attribute's key was found in some OCR line
//! 2. value presence: at least one candidate value fuzzy-occurs in the text
//! 3. co-occurrence: the key is directly followed by a hit value, or the
//!    attribute's guidance regex extracts a known value
//!
//! Each stage consumes the previous stage's buckets and builds new ones.
//! Attributes only ever move from matched to not-matched.

use std::collections::{BTreeMap, BTreeSet};

use regex::{Regex, RegexBuilder};
use tracing::{debug, info, warn};

use super::fuzzy::FuzzyMatcher;
use crate::guidance::GuidanceSet;
use crate::verdict::Buckets;

/// Separator allowed between a key and its value.
const SEPARATOR: &str = r"[:\-–—=]?\s*";

/// Buckets after each stage of one funnel run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunnelStages {
    pub key_matched: Buckets,
    pub value_matched: Buckets,
    pub pair_matched: Buckets,
}

impl FunnelStages {
    /// The funnel's final verdict.
    pub fn result(&self) -> &Buckets {
        &self.pair_matched
    }
}

/// Runs the three stages with shared matcher and guidance.
#[derive(Debug, Clone, Copy)]
pub struct Funnel<'a> {
    matcher: &'a FuzzyMatcher,
    guidance: &'a GuidanceSet,
}

impl<'a> Funnel<'a> {
    pub fn new(matcher: &'a FuzzyMatcher, guidance: &'a GuidanceSet) -> Self {
        Self { matcher, guidance }
    }

    /// Run every stage over the product-type partition.
    ///
    /// `full_text` must already be lowercase.
    pub fn run(
        &self,
        partition: &Buckets,
        matched_keys: &BTreeSet<String>,
        full_text: &str,
    ) -> FunnelStages {
        let key_matched = refine_by_key_hits(partition, matched_keys);
        let value_matched = refine_by_value_hits(&key_matched, full_text, self.matcher);
        let pair_matched =
            refine_by_key_value_pairs(&value_matched, full_text, self.matcher, self.guidance);
        FunnelStages {
            key_matched,
            value_matched,
            pair_matched,
        }
    }
}

/// Stage 1: keep attributes whose key was hit; the rest move to not-matched
/// with every value forced `false`.
pub fn refine_by_key_hits(input: &Buckets, matched_keys: &BTreeSet<String>) -> Buckets {
    let mut out = Buckets {
        matched: BTreeMap::new(),
        not_matched: input.not_matched.clone(),
    };
    for verdict in input.matched.values() {
        if matched_keys.contains(&verdict.original_key) {
            out.insert_matched(verdict.clone());
        } else {
            debug!("Key '{}' not found in OCR lines", verdict.original_key);
            out.insert_not_matched(verdict.cleared());
        }
    }
    info!(
        "Key refinement: {} kept, {} not matched",
        out.matched.len(),
        out.not_matched.len()
    );
    out
}

/// Stage 2: mark each candidate value by fuzzy presence in `full_text`.
/// Attributes with no hit value move to not-matched, keeping their value map.
pub fn refine_by_value_hits(input: &Buckets, full_text: &str, matcher: &FuzzyMatcher) -> Buckets {
    let lowered = full_text.to_lowercase();
    let mut out = Buckets {
        matched: BTreeMap::new(),
        not_matched: input.not_matched.clone(),
    };
    for verdict in input.matched.values() {
        let values: BTreeMap<String, bool> = verdict
            .candidate_values
            .keys()
            .map(|v| {
                let hit = matcher.contains_lowered(v, &lowered);
                if hit {
                    debug!("Value '{}' found for '{}'", v, verdict.attribute_name);
                }
                (v.clone(), hit)
            })
            .collect();
        let next = verdict.with_values(values);
        if next.has_hit() {
            out.insert_matched(next);
        } else {
            out.insert_not_matched(next);
        }
    }
    info!(
        "Value refinement: {} kept, {} not matched",
        out.matched.len(),
        out.not_matched.len()
    );
    out
}

/// Stage 3: confirm that key and value actually appear together.
///
/// A value hit in stage 2 is confirmed when the key is immediately followed
/// (after an optional separator) by one of the value's OCR variants. The
/// attribute's guidance regex, when present, can confirm any candidate value
/// it extracts from the text.
pub fn refine_by_key_value_pairs(
    input: &Buckets,
    full_text: &str,
    matcher: &FuzzyMatcher,
    guidance: &GuidanceSet,
) -> Buckets {
    let lowered = full_text.to_lowercase();
    let mut out = Buckets {
        matched: BTreeMap::new(),
        not_matched: input.not_matched.clone(),
    };
    for verdict in input.matched.values() {
        let key = &verdict.original_key;
        let mut values: BTreeMap<String, bool> = verdict
            .candidate_values
            .iter()
            .map(|(value, &hit)| {
                let confirmed = hit && matches_key_value_pair(key, value, &lowered, matcher);
                if confirmed {
                    debug!("Matched key-value pair: {} -> {}", key, value);
                }
                (value.clone(), confirmed)
            })
            .collect();

        if let Some(pattern) = guidance.pair_regex(key) {
            for value in regex_value_hits(pattern, key, &lowered, &verdict.candidate_values) {
                debug!("Regex matched key-value: {} -> {}", key, value);
                values.insert(value, true);
            }
        }

        let next = verdict.with_values(values);
        if next.has_hit() {
            out.insert_matched(next);
        } else {
            out.insert_not_matched(next);
        }
    }
    info!(
        "Key-value validation complete: {} attribute(s) confirmed",
        out.matched.len()
    );
    out
}

/// Whether `key`, an optional separator and some OCR variant of `value`
/// appear in sequence in `text`. An empty key never matches.
pub fn matches_key_value_pair(key: &str, value: &str, text: &str, matcher: &FuzzyMatcher) -> bool {
    let key = key.trim().to_lowercase();
    if key.is_empty() {
        debug!("Key is empty after cleaning; skipping pair check");
        return false;
    }
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let lowered = text.to_lowercase();
    let key_esc = regex::escape(&key);
    let variants = matcher.variants(value);

    let alternation = variants
        .iter()
        .map(|v| regex::escape(v))
        .collect::<Vec<_>>()
        .join("|");
    match Regex::new(&format!("{}{}(?:{})", key_esc, SEPARATOR, alternation)) {
        Ok(re) => re.is_match(&lowered),
        Err(e) => {
            debug!("Combined pair pattern rejected ({}); testing variants one by one", e);
            variants.iter().any(|v| {
                Regex::new(&format!("{}{}{}", key_esc, SEPARATOR, regex::escape(v)))
                    .map(|re| re.is_match(&lowered))
                    .unwrap_or(false)
            })
        }
    }
}

/// Candidate values extracted from `text` by a guidance pattern.
///
/// Each match is compared by its first capture group when the pattern has
/// one, else by the whole match. A leading key label and separator are
/// tolerated. Comparison is case-insensitive and trimmed. An invalid pattern
/// yields nothing.
pub fn regex_value_hits(
    pattern: &str,
    key: &str,
    text: &str,
    candidates: &BTreeMap<String, bool>,
) -> BTreeSet<String> {
    let re = match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => re,
        Err(e) => {
            warn!("Invalid guidance regex for '{}': {}", key, e);
            return BTreeSet::new();
        }
    };
    let lookup: BTreeMap<String, &String> = candidates
        .keys()
        .map(|v| (v.trim().to_lowercase(), v))
        .collect();
    let key_lower = key.trim().to_lowercase();

    let mut hits = BTreeSet::new();
    for caps in re.captures_iter(text) {
        let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
            continue;
        };
        let raw = m.as_str().trim().to_lowercase();
        let without_key = raw
            .strip_prefix(key_lower.as_str())
            .map(|rest| rest.trim_start_matches(|c: char| c.is_whitespace() || ":-–—=".contains(c)));
        for candidate in std::iter::once(raw.as_str()).chain(without_key) {
            if let Some(value) = lookup.get(candidate.trim()) {
                hits.insert((*value).clone());
            }
        }
    }
    hits
}
