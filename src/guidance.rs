//! Regex guidance: per-attribute patterns that extract values from text.
//!
//! Attributes whose formatting instructions read alike are sent to the
//! LLM together, one prompt per group, and the answers are merged into a
//! [`GuidanceSet`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::llm::{generate_valid_json, prompts, LlmError, TextGenerator};
use crate::schema::Schema;

/// Default similarity needed to join a formatting group.
pub const DEFAULT_GROUPING_THRESHOLD: f64 = 0.5;

/// Schema fields that are not sent to the regex prompt.
const STRIPPED_FIELDS: [&str; 2] = ["data_type", "product_types"];

/// Guidance for one attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexGuidance {
    #[serde(default)]
    pub pair_regex: Option<String>,
}

impl RegexGuidance {
    pub fn pattern(pattern: &str) -> Self {
        Self {
            pair_regex: Some(pattern.to_string()),
        }
    }
}

/// Guidance for every attribute, keyed by attribute name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GuidanceSet {
    entries: BTreeMap<String, RegexGuidance>,
}

impl GuidanceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, guidance: RegexGuidance) {
        self.entries.insert(name.into(), guidance);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, RegexGuidance> {
        &self.entries
    }

    /// Pattern for an attribute, looked up case-insensitively. Blank
    /// patterns and the string "null" count as absent.
    pub fn pair_regex(&self, attribute: &str) -> Option<&str> {
        let wanted = attribute.trim().to_lowercase();
        self.entries
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .and_then(|(_, g)| g.pair_regex.as_deref())
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("null"))
    }

    /// Build from a model's JSON answer. Entries that are not
    /// `{ "pair_regex": ... }` objects are skipped.
    pub fn from_json_object(map: Map<String, Value>) -> Self {
        let mut set = Self::new();
        for (name, value) in map {
            match serde_json::from_value::<RegexGuidance>(value) {
                Ok(guidance) => set.insert(name, guidance),
                Err(e) => warn!("Ignoring malformed guidance for '{}': {}", name, e),
            }
        }
        set
    }
}

fn parenthetical_regex() -> &'static Regex {
    static PARENS: OnceLock<Regex> = OnceLock::new();
    PARENS.get_or_init(|| Regex::new(r"\(.*?\)").expect("static parenthetical pattern"))
}

fn whitespace_regex() -> &'static Regex {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    SPACES.get_or_init(|| Regex::new(r"\s+").expect("static whitespace pattern"))
}

/// Lowercase, drop parentheticals, collapse whitespace.
pub fn normalize_formatting(text: &str) -> String {
    let lowered = text.to_lowercase();
    let no_parens = parenthetical_regex().replace_all(&lowered, "");
    whitespace_regex()
        .replace_all(&no_parens, " ")
        .trim()
        .to_string()
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the
/// total length. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    let (i, j, k) = longest_common_run(a, b);
    if k == 0 {
        return 0;
    }
    k + matching_chars(&a[..i], &b[..j]) + matching_chars(&a[i + k..], &b[j + k..])
}

/// Longest common contiguous run, earliest in `a` then `b` on ties.
fn longest_common_run(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut row = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                row[j + 1] = prev[j] + 1;
                let k = row[j + 1];
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            }
        }
        prev = row;
    }
    best
}

/// Group attributes whose normalised formatting sentences are similar.
///
/// Greedy: each ungrouped attribute starts a group and pulls in every later
/// ungrouped attribute at or above `threshold`. Returned entries are the
/// attributes' JSON with `data_type` and `product_types` removed.
pub fn group_by_formatting(schema: &Schema, threshold: f64) -> Vec<BTreeMap<String, Value>> {
    let items: Vec<(&String, String, Value)> = schema
        .attributes()
        .map(|(name, def)| {
            let text = normalize_formatting(def.formatting.as_deref().unwrap_or(""));
            let mut json = serde_json::to_value(def).unwrap_or(Value::Null);
            if let Value::Object(ref mut map) = json {
                for field in STRIPPED_FIELDS {
                    map.remove(field);
                }
            }
            (name, text, json)
        })
        .collect();

    let mut grouped = vec![false; items.len()];
    let mut groups = Vec::new();
    for i in 0..items.len() {
        if grouped[i] {
            continue;
        }
        grouped[i] = true;
        let mut group = BTreeMap::new();
        group.insert(items[i].0.clone(), items[i].2.clone());
        for j in (i + 1)..items.len() {
            if !grouped[j] && similarity(&items[i].1, &items[j].1) >= threshold {
                grouped[j] = true;
                group.insert(items[j].0.clone(), items[j].2.clone());
            }
        }
        groups.push(group);
    }
    debug!(
        "Grouped {} attribute(s) into {} formatting group(s)",
        items.len(),
        groups.len()
    );
    groups
}

/// Ask the model for guidance, one prompt per formatting group. Answers are
/// filed under the schema's spelling of each attribute name.
pub async fn generate_guidance(
    schema: &Schema,
    generator: &dyn TextGenerator,
    threshold: f64,
    retries: usize,
) -> Result<GuidanceSet, LlmError> {
    let groups = group_by_formatting(schema, threshold);
    let mut guidance = GuidanceSet::new();
    for (i, group) in groups.iter().enumerate() {
        info!(
            "Generating regex guidance for group {}/{} ({} attribute(s))",
            i + 1,
            groups.len(),
            group.len()
        );
        let input =
            serde_json::to_string_pretty(group).map_err(|e| LlmError::Parse(e.to_string()))?;
        let answer =
            generate_valid_json(generator, &prompts::regex_prompt(&input), None, retries).await?;
        for (name, entry) in GuidanceSet::from_json_object(answer).entries {
            match schema.get_by_key(&name) {
                Some((canonical, _)) => guidance.insert(canonical, entry),
                None => warn!("Ignoring guidance for unknown attribute '{}'", name),
            }
        }
    }
    info!("Generated regex guidance for {} attribute(s)", guidance.len());
    Ok(guidance)
}
