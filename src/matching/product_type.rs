//! Product-type detection through characteristic mounting vocabulary.
//!
//! Spec sheets rarely print their product category, but they do describe
//! how the product is installed ("recessed", "pendant", "surface mount").
//! A lookup maps each product type to such terms, and a type is detected
//! when any of its terms fuzzy-occurs in the document text.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fuzzy::FuzzyMatcher;

/// Mounting terms for one product type: a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MountingTerms {
    One(String),
    Many(Vec<String>),
}

impl MountingTerms {
    /// All terms in this entry.
    pub fn terms(&self) -> Vec<&str> {
        match self {
            MountingTerms::One(s) => vec![s.as_str()],
            MountingTerms::Many(v) => v.iter().map(|s| s.as_str()).collect(),
        }
    }
}

impl From<&str> for MountingTerms {
    fn from(term: &str) -> Self {
        MountingTerms::One(term.to_string())
    }
}

/// Product type name -> mounting terms.
pub type ProductTypeLookup = BTreeMap<String, MountingTerms>;

/// Product types whose mounting terms occur in `text`.
pub fn match_product_types(
    text: &str,
    lookup: &ProductTypeLookup,
    matcher: &FuzzyMatcher,
) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    let matched: BTreeSet<String> = lookup
        .iter()
        .filter(|(product_type, terms)| {
            let hit = terms
                .terms()
                .into_iter()
                .find(|term| matcher.contains_lowered(term, &lowered));
            if let Some(term) = hit {
                debug!("Product type '{}' matched via term '{}'", product_type, term);
            }
            hit.is_some()
        })
        .map(|(product_type, _)| product_type.clone())
        .collect();
    info!(
        "Matched {} of {} product type(s): {:?}",
        matched.len(),
        lookup.len(),
        matched
    );
    matched
}
