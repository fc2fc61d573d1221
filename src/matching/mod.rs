//! Attribute matching: OCR-tolerant term tests, key location, product-type
//! gating, the refinement funnel, table recovery and result merging.

pub mod funnel;
pub mod fuzzy;
pub mod keys;
pub mod merge;
pub mod partition;
pub mod product_type;
pub mod table;

pub use funnel::{Funnel, FunnelStages};
pub use fuzzy::{FuzzyMatcher, VariantLimits};
pub use keys::{find_key_hits, KeyHit, KeyHits};
pub use merge::merge_results;
pub use partition::split_schema_by_product_type_match;
pub use product_type::{match_product_types, MountingTerms, ProductTypeLookup};
pub use table::{TableExtractor, TableSettings};
