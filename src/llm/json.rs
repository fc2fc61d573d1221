//! Lenient parsing of model output that should be a JSON object.
//!
//! Models wrap JSON in prose or markdown fences and leave trailing commas.
//! The ladder is: strict parse as an object, then the outermost `{...}`
//! span, then that span with trailing commas removed. Anything still
//! unparseable is [`LlmError::InvalidJson`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{LlmError, TextGenerator};

/// Default number of fresh generations before giving up.
pub const DEFAULT_JSON_RETRIES: usize = 3;

fn trailing_comma_regex() -> &'static Regex {
    static TRAILING: OnceLock<Regex> = OnceLock::new();
    TRAILING.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("static trailing comma pattern"))
}

fn as_object(value: Value) -> Result<Map<String, Value>, LlmError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(LlmError::InvalidJson(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse model output into a JSON object, repairing common damage.
pub fn lenient_parse(text: &str) -> Result<Map<String, Value>, LlmError> {
    let text = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) {
        return Ok(map);
    }

    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };
    if let Ok(value) = serde_json::from_str::<Value>(span) {
        debug!("Parsed JSON after stripping surrounding text");
        return as_object(value);
    }

    let repaired = trailing_comma_regex().replace_all(span, "$1");
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            debug!("Parsed JSON after removing trailing commas");
            as_object(value)
        }
        Err(e) => Err(LlmError::InvalidJson(e.to_string())),
    }
}

/// Obtain a JSON object for `prompt`.
///
/// An `initial` response is tried first. Then up to `max_retries` fresh
/// generations are parsed. Transport errors are returned immediately; only
/// unparseable output is retried.
pub async fn generate_valid_json(
    generator: &dyn TextGenerator,
    prompt: &str,
    initial: Option<&str>,
    max_retries: usize,
) -> Result<Map<String, Value>, LlmError> {
    if let Some(response) = initial {
        match lenient_parse(response) {
            Ok(map) => return Ok(map),
            Err(_) => info!("Initial response is invalid JSON; regenerating"),
        }
    }

    for attempt in 1..=max_retries {
        info!("LLM JSON generation attempt {}/{}", attempt, max_retries);
        let response = generator.generate(prompt).await?;
        match lenient_parse(&response) {
            Ok(map) => return Ok(map),
            Err(e) => warn!("Attempt {} returned invalid JSON: {}", attempt, e),
        }
    }

    Err(LlmError::RetriesExhausted {
        attempts: max_retries,
    })
}
