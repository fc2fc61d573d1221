//! Per-attribute verdict records and the matched/not-matched bucket pair.
//!
//! Verdicts are values: every funnel stage builds the next stage's verdicts
//! from the previous ones and never mutates a bucket it was handed.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::schema::AttributeDefinition;

/// Evidence state for one schema attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeVerdict {
    pub attribute_name: String,
    /// Key text as printed in the schema (used for key/value co-occurrence).
    pub original_key: String,
    #[serde(default)]
    pub data_type: String,
    /// Candidate value -> whether it has been hit.
    #[serde(rename = "values")]
    pub candidate_values: BTreeMap<String, bool>,
    /// Declared product type -> whether it was detected in the document.
    #[serde(rename = "product_types")]
    pub product_type_status: BTreeMap<String, bool>,
}

impl AttributeVerdict {
    /// Initial verdict for an attribute: every value unhit, product types
    /// checked against the detected set.
    pub fn from_definition(
        name: &str,
        definition: &AttributeDefinition,
        matched_product_types: &BTreeSet<String>,
    ) -> Self {
        Self {
            attribute_name: name.to_string(),
            original_key: name.to_string(),
            data_type: definition.data_type.clone(),
            candidate_values: definition
                .values
                .iter()
                .map(|v| (v.clone(), false))
                .collect(),
            product_type_status: definition
                .product_types
                .iter()
                .map(|p| (p.clone(), matched_product_types.contains(p)))
                .collect(),
        }
    }

    /// At least one declared product type was detected.
    pub fn is_applicable(&self) -> bool {
        self.product_type_status.values().any(|&hit| hit)
    }

    /// At least one candidate value is marked as hit.
    pub fn has_hit(&self) -> bool {
        self.candidate_values.values().any(|&hit| hit)
    }

    /// Values currently marked as hit.
    pub fn hit_values(&self) -> impl Iterator<Item = &str> {
        self.candidate_values
            .iter()
            .filter(|(_, &hit)| hit)
            .map(|(v, _)| v.as_str())
    }

    /// A copy carrying a new value map.
    pub fn with_values(&self, candidate_values: BTreeMap<String, bool>) -> Self {
        Self {
            candidate_values,
            ..self.clone()
        }
    }

    /// A copy with every candidate value forced to `false`.
    pub fn cleared(&self) -> Self {
        self.with_values(
            self.candidate_values
                .keys()
                .map(|v| (v.clone(), false))
                .collect(),
        )
    }
}

/// A strategy's verdict split. An attribute sits in at most one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    pub matched: BTreeMap<String, AttributeVerdict>,
    pub not_matched: BTreeMap<String, AttributeVerdict>,
}

impl Buckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a verdict in the matched bucket, removing it from not-matched.
    pub fn insert_matched(&mut self, verdict: AttributeVerdict) {
        self.not_matched.remove(&verdict.attribute_name);
        self.matched.insert(verdict.attribute_name.clone(), verdict);
    }

    /// Place a verdict in the not-matched bucket, removing it from matched.
    pub fn insert_not_matched(&mut self, verdict: AttributeVerdict) {
        self.matched.remove(&verdict.attribute_name);
        self.not_matched
            .insert(verdict.attribute_name.clone(), verdict);
    }

    pub fn is_matched(&self, name: &str) -> bool {
        self.matched.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.matched.contains_key(name) || self.not_matched.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.matched.len() + self.not_matched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matched.is_empty() && self.not_matched.is_empty()
    }

    /// Every attribute name present in either bucket.
    pub fn names(&self) -> BTreeSet<String> {
        self.matched
            .keys()
            .chain(self.not_matched.keys())
            .cloned()
            .collect()
    }

    /// Flatten both buckets into one attribute -> verdict mapping.
    pub fn into_result(self) -> BTreeMap<String, AttributeVerdict> {
        let mut result = self.not_matched;
        result.extend(self.matched);
        result
    }
}
