//! Combine verdicts from independent strategies.

use tracing::info;

use crate::verdict::Buckets;

/// Merge strategy results into one split.
///
/// An attribute matched by any strategy is matched, using the first matched
/// version. Otherwise its first not-matched version is used. Every attribute
/// seen in any input ends up in exactly one output bucket.
pub fn merge_results<'a, I>(results: I) -> Buckets
where
    I: IntoIterator<Item = &'a Buckets>,
{
    let results: Vec<&Buckets> = results.into_iter().collect();
    let mut merged = Buckets::new();

    for buckets in &results {
        for (name, verdict) in &buckets.matched {
            if !merged.is_matched(name) {
                merged.insert_matched(verdict.clone());
            }
        }
    }
    for buckets in &results {
        for (name, verdict) in &buckets.not_matched {
            if !merged.contains(name) {
                merged.insert_not_matched(verdict.clone());
            }
        }
    }

    info!(
        "Merged {} strategy result(s): {} matched, {} not matched",
        results.len(),
        merged.matched.len(),
        merged.not_matched.len()
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeDefinition;
    use crate::verdict::AttributeVerdict;
    use std::collections::BTreeSet;

    fn verdict(name: &str, hit: Option<&str>) -> AttributeVerdict {
        let def = AttributeDefinition::new("string", &["a", "b"], &["T"]);
        let v = AttributeVerdict::from_definition(name, &def, &BTreeSet::new());
        match hit {
            Some(value) => {
                let mut values = v.candidate_values.clone();
                values.insert(value.to_string(), true);
                v.with_values(values)
            }
            None => v,
        }
    }

    #[test]
    fn test_matched_anywhere_wins() {
        let mut funnel = Buckets::new();
        funnel.insert_not_matched(verdict("X", None));
        let mut table = Buckets::new();
        table.insert_matched(verdict("X", Some("a")));

        let merged = merge_results([&funnel, &table]);
        assert!(merged.is_matched("X"));
        assert!(!merged.not_matched.contains_key("X"));
        assert_eq!(merged.matched["X"].candidate_values["a"], true);
    }

    #[test]
    fn test_first_matched_version_is_kept() {
        let mut first = Buckets::new();
        first.insert_matched(verdict("X", Some("a")));
        let mut second = Buckets::new();
        second.insert_matched(verdict("X", Some("b")));

        let merged = merge_results([&first, &second]);
        assert_eq!(merged.matched["X"].candidate_values["a"], true);
        assert_eq!(merged.matched["X"].candidate_values["b"], false);
    }

    #[test]
    fn test_every_name_in_exactly_one_bucket() {
        let mut a = Buckets::new();
        a.insert_matched(verdict("X", Some("a")));
        a.insert_not_matched(verdict("Y", None));
        let mut b = Buckets::new();
        b.insert_not_matched(verdict("X", None));
        b.insert_not_matched(verdict("Z", None));
        let c = Buckets::new();

        let merged = merge_results([&a, &b, &c]);
        let names: BTreeSet<String> = ["X", "Y", "Z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(merged.names(), names);
        for name in &names {
            assert!(merged.matched.contains_key(name) ^ merged.not_matched.contains_key(name));
        }
    }

    #[test]
    fn test_no_inputs() {
        assert!(merge_results(std::iter::empty::<&Buckets>()).is_empty());
    }
}
