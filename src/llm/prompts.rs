//! Prompt templates for the two LLM tasks.

use std::collections::BTreeSet;

/// Prompt asking for product type -> mounting term(s).
pub const MOUNTING_PROMPT: &str = r#"You are a lighting product domain expert. Your knowledge comes from manufacturer spec sheets, product cut sheets, digital spec sheets and lighting exchange listings, across architectural, commercial, residential, industrial, outdoor and emergency lighting and lighting controls.

You are given a list of lighting product types:
{product_types}

For each product type, give the most typical mounting description used in manufacturer specifications. If a product type commonly uses more than one mounting description, give a list of mounting words ordered from most specific to most general.

Typical mounting terms include, but are not limited to:
- primary mounting styles: recessed, surface, suspended, pendant, wall, pole, ceiling, ingrade, ground
- mounting methods and supports: cable, stem, chain, truss, canopy, magnetic, junction
- application-specific mountings: portable, underwater, submersible, highmast, stake, bracket, arm

Prefer widely recognized industry terminology over generic physical descriptions.

Respond with a single JSON object. Each key must be the original product type. Each value must be a mounting word or a list of mounting words. Use double quotes for all keys and strings. Do not include explanations, comments or markdown."#;

/// Prompt asking for a `pair_regex` per attribute in a group.
pub const REGEX_PROMPT: &str = r#"You are a JSON-only regex generator. Follow these rules exactly.

1. OUTPUT FORMAT
   - Output one JSON object whose top-level keys are exactly the attribute names in the input.
   - Each key maps to an object with exactly one field, "pair_regex".
   - "pair_regex" is either a string holding a properly escaped regex pattern, or literal JSON null (not the string "null").

2. RETURN null WHEN
   - "Expected Output Formatting" contains any of: "exactly match", "predefined list", "must be one of", "strictly match", "true/false statement", "enum", "categorical", "fixed options" (case-insensitive)
   - the values are static words without digits, percentages or units
   - Exception: if the formatting says "Return Any Values" or "Return All Values", write a regex instead, unless one of the phrases above also appears.

3. OTHERWISE WRITE A REGEX
   - Shape: case-insensitive key, separator, value pattern: (?i)\bKey Name\b[\s:-]+VALUE
   - VALUE for "Return Any/All Values": exactly one word, \S+
   - VALUE for numeric measurements (4in, 2x2): \d+(?:\.\d+)?(?:\s*[a-zA-Z%]+)?
   - VALUE for watts: \d+(?:\.\d+)?\s*[wW]
   - VALUE for percentages: \d+(?:\.\d+)?%
   - Wrap the value part in one capture group so the value can be read on its own.
   - Never hardcode entries of the "values" array.
   - Do not use look-ahead or look-behind.
   - Escape backslashes for JSON: \b is written "\\b".

Example output:
{
  "Finish": { "pair_regex": "(?i)\\bFinish\\b[\\s:-]+(\\S+)" },
  "Input Watts": { "pair_regex": "(?i)\\bInput Watts\\b[\\s:-]+(\\d+(?:\\.\\d+)?\\s*[wW])" },
  "Status": { "pair_regex": null }
}

INPUT DATA
{attributes}

OUTPUT (valid JSON only):"#;

/// Render the mounting prompt for a set of product types.
pub fn mounting_prompt(product_types: &BTreeSet<String>) -> String {
    let list = product_types
        .iter()
        .map(|p| format!("- {}", p))
        .collect::<Vec<_>>()
        .join("\n");
    MOUNTING_PROMPT.replace("{product_types}", &list)
}

/// Render the regex prompt for one group of attributes (already JSON).
pub fn regex_prompt(attributes_json: &str) -> String {
    REGEX_PROMPT.replace("{attributes}", attributes_json)
}
