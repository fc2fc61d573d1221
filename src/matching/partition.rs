//! Split the schema by product-type applicability.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::schema::Schema;
use crate::verdict::{AttributeVerdict, Buckets};

/// Attributes with at least one detected product type go to `matched`;
/// the rest go to `not_matched` with every value `false`.
pub fn split_schema_by_product_type_match(
    schema: &Schema,
    matched_product_types: &BTreeSet<String>,
) -> Buckets {
    let mut buckets = Buckets::new();
    for (name, definition) in schema.attributes() {
        let verdict = AttributeVerdict::from_definition(name, definition, matched_product_types);
        if verdict.is_applicable() {
            buckets.insert_matched(verdict);
        } else {
            debug!("Attribute '{}' does not apply to detected product types", name);
            buckets.insert_not_matched(verdict.cleared());
        }
    }
    info!(
        "Product-type partition: {} applicable, {} not applicable",
        buckets.matched.len(),
        buckets.not_matched.len()
    );
    buckets
}
