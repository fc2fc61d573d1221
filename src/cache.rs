//! On-disk caches for LLM-generated inputs.
//!
//! - `llm_output.json`: product type -> mounting term(s), grown as new
//!   schemas introduce new product types
//! - `regex_guidance_<schema hash>.json`: guidance for one exact schema
//!
//! Both are read-then-write with a single writer; callers that process
//! documents in parallel must build them once up front.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::guidance::{generate_guidance, GuidanceSet};
use crate::llm::{generate_valid_json, prompts, LlmError, TextGenerator};
use crate::matching::{MountingTerms, ProductTypeLookup};
use crate::schema::Schema;

/// File name of the product-type lookup cache.
pub const LOOKUP_FILE: &str = "llm_output.json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt cache file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Directory holding the caches.
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lookup_path(&self) -> PathBuf {
        self.root.join(LOOKUP_FILE)
    }

    pub fn guidance_path(&self, schema_hash: &str) -> PathBuf {
        self.root.join(format!("regex_guidance_{}.json", schema_hash))
    }

    /// Cached lookup, if the file exists.
    pub fn load_lookup(&self) -> Result<Option<ProductTypeLookup>, CacheError> {
        read_json(&self.lookup_path())
    }

    /// Cached guidance for a schema hash, if the file exists.
    pub fn load_guidance(&self, schema_hash: &str) -> Result<Option<GuidanceSet>, CacheError> {
        read_json(&self.guidance_path(schema_hash))
    }

    /// Lookup covering every product type in `schema`.
    ///
    /// A cache covering the schema is reused as is. Missing product types
    /// are generated and merged into the cache. Without a cache everything
    /// is generated.
    pub async fn product_type_lookup(
        &self,
        schema: &Schema,
        generator: &dyn TextGenerator,
        retries: usize,
    ) -> Result<ProductTypeLookup, CacheError> {
        let wanted = schema.product_types();
        let path = self.lookup_path();

        let mut lookup = match self.load_lookup()? {
            Some(lookup) => {
                info!("Found cached product-type lookup: {}", path.display());
                lookup
            }
            None => {
                info!("No cached lookup found; generating full lookup");
                ProductTypeLookup::new()
            }
        };

        let missing: BTreeSet<String> = wanted
            .iter()
            .filter(|p| !lookup.contains_key(*p))
            .cloned()
            .collect();
        if missing.is_empty() {
            info!("Cached lookup covers all {} product type(s)", wanted.len());
            return Ok(lookup);
        }

        info!("Generating lookup for product types: {:?}", missing);
        let answer =
            generate_valid_json(generator, &prompts::mounting_prompt(&missing), None, retries)
                .await?;
        lookup.extend(lookup_from_json(answer));
        write_json(&path, &lookup)?;
        info!("Lookup updated and saved to {}", path.display());
        Ok(lookup)
    }

    /// Regenerate the whole lookup for `schema`, replacing the cache.
    pub async fn rebuild_product_type_lookup(
        &self,
        schema: &Schema,
        generator: &dyn TextGenerator,
        retries: usize,
    ) -> Result<ProductTypeLookup, CacheError> {
        let path = self.lookup_path();
        let answer = generate_valid_json(
            generator,
            &prompts::mounting_prompt(&schema.product_types()),
            None,
            retries,
        )
        .await?;
        let lookup = lookup_from_json(answer);
        write_json(&path, &lookup)?;
        info!("Lookup rebuilt and saved to {}", path.display());
        Ok(lookup)
    }

    /// Guidance for `schema`, generated once per distinct schema content.
    pub async fn regex_guidance(
        &self,
        schema: &Schema,
        generator: &dyn TextGenerator,
        grouping_threshold: f64,
        retries: usize,
    ) -> Result<GuidanceSet, CacheError> {
        let hash = schema.content_hash();
        if let Some(guidance) = self.load_guidance(hash)? {
            info!("Reusing cached regex guidance for schema {}", &hash[..12.min(hash.len())]);
            return Ok(guidance);
        }

        let guidance = generate_guidance(schema, generator, grouping_threshold, retries).await?;
        let path = self.guidance_path(hash);
        write_json(&path, &guidance)?;
        info!("Regex guidance saved to {}", path.display());
        Ok(guidance)
    }
}

/// Keep entries that are a term or a list of terms.
fn lookup_from_json(map: Map<String, Value>) -> ProductTypeLookup {
    map.into_iter()
        .filter_map(|(product_type, value)| {
            match serde_json::from_value::<MountingTerms>(value) {
                Ok(terms) => Some((product_type, terms)),
                Err(e) => {
                    warn!("Ignoring lookup entry for '{}': {}", product_type, e);
                    None
                }
            }
        })
        .collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, CacheError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| CacheError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), CacheError> {
    let io_err = |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|source| CacheError::Corrupt {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_err)
}
