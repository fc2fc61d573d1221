//! Attribute schema: loading, normalisation and key lookup.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from loading a schema file. All of them are fatal for a run.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Schema file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read schema {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in schema {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One named schema entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    #[serde(default)]
    pub data_type: String,
    /// Candidate values. Order is irrelevant; duplicates are dropped on load.
    #[serde(default, deserialize_with = "deserialize_values")]
    pub values: Vec<String>,
    /// Product types this attribute applies to.
    #[serde(default)]
    pub product_types: Vec<String>,
    /// Free-text formatting instructions, used to group attributes for regex guidance.
    #[serde(
        rename = "Expected Output Formatting",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub formatting: Option<String>,
    /// Any other fields the schema author added; passed through to guidance prompts.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl AttributeDefinition {
    pub fn new(data_type: &str, values: &[&str], product_types: &[&str]) -> Self {
        Self {
            data_type: data_type.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            product_types: product_types.iter().map(|p| p.to_string()).collect(),
            formatting: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_formatting(mut self, formatting: &str) -> Self {
        self.formatting = Some(formatting.to_string());
        self
    }

    fn dedup_values(&mut self, name: &str) {
        let mut seen = BTreeSet::new();
        let before = self.values.len();
        self.values.retain(|v| seen.insert(v.clone()));
        if self.values.len() != before {
            warn!(
                "Attribute '{}' listed {} duplicate value(s); keeping first occurrences",
                name,
                before - self.values.len()
            );
        }
    }
}

/// Values may be written as strings or bare numbers (`[3000, "4000K"]`).
fn deserialize_values<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<serde_json::Value> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect())
}

/// The loaded attribute schema. Immutable once built.
#[derive(Debug, Clone)]
pub struct Schema {
    attributes: BTreeMap<String, AttributeDefinition>,
    hash: String,
}

impl Schema {
    /// Load a schema from a JSON file.
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        info!("Loading attribute schema from: {}", path.display());
        if !path.exists() {
            return Err(SchemaError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let schema = Self::from_slice(&bytes).map_err(|source| SchemaError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded schema with {} attributes", schema.len());
        Ok(schema)
    }

    /// Parse a schema from raw JSON bytes. The content hash covers these bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let attributes: BTreeMap<String, AttributeDefinition> = serde_json::from_slice(bytes)?;
        Ok(Self::build(attributes, content_hash(bytes)))
    }

    /// Build a schema from in-memory definitions. The hash covers their JSON form.
    pub fn from_attributes(attributes: BTreeMap<String, AttributeDefinition>) -> Self {
        let json = serde_json::to_vec(&attributes).unwrap_or_default();
        Self::build(attributes, content_hash(&json))
    }

    fn build(mut attributes: BTreeMap<String, AttributeDefinition>, hash: String) -> Self {
        for (name, attr) in attributes.iter_mut() {
            attr.dedup_values(name);
        }
        Self { attributes, hash }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&String, &AttributeDefinition)> {
        self.attributes.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.attributes.keys()
    }

    /// Exact lookup by attribute name.
    pub fn get(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    /// Case-insensitive, whitespace-trimmed lookup. Returns the schema's own
    /// spelling of the name along with the definition.
    pub fn get_by_key(&self, key: &str) -> Option<(&str, &AttributeDefinition)> {
        let wanted = key.trim().to_lowercase();
        let found = self
            .attributes
            .iter()
            .find(|(name, _)| name.trim().to_lowercase() == wanted)
            .map(|(name, attr)| (name.as_str(), attr));
        if found.is_none() {
            debug!("No attribute matches key '{}'", key);
        }
        found
    }

    /// Union of every attribute's product types.
    pub fn product_types(&self) -> BTreeSet<String> {
        self.attributes
            .values()
            .flat_map(|a| a.product_types.iter().cloned())
            .collect()
    }

    /// SHA-256 hex digest identifying this schema's content.
    pub fn content_hash(&self) -> &str {
        &self.hash
    }
}

/// Compute the SHA-256 hex digest of some bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
