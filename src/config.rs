//! Configuration management.
//!
//! Settings come from defaults, then a config file (TOML, YAML or JSON,
//! found through `prefer` or given with `--config`), then environment
//! variables, then command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::guidance::DEFAULT_GROUPING_THRESHOLD;
use crate::layout::TABLE_CLASS;
use crate::llm::{LlmConfig, DEFAULT_JSON_RETRIES};
use crate::matching::fuzzy::{DEFAULT_VARIANT_CAP, VARIANT_WARN_THRESHOLD};
use crate::matching::table::DEFAULT_OVERLAP_THRESHOLD;
use crate::matching::{TableSettings, VariantLimits};

/// Default output directory name.
const DEFAULT_OUTPUT_DIR: &str = "output";

/// Matching tunables as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Share of a key's width a token must overlap to count as beneath it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overlap_threshold: Option<f32>,
    /// Layout class label of tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_class: Option<u32>,
    /// Variant count that triggers a warning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_warn_threshold: Option<usize>,
    /// Variant count above which expansion is skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_cap: Option<usize>,
    /// Formatting similarity needed to share a guidance prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouping_threshold: Option<f64>,
    /// Fresh LLM calls allowed when output is not valid JSON.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_retries: Option<usize>,
}

impl MatchingConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Where results (and, by default, caches) are written.
    pub output_dir: PathBuf,
    /// Cache directory override.
    pub cache_dir: Option<PathBuf>,
    /// Copy each input into `success_found/` or `not_found/` after processing.
    pub sort_inputs: bool,
    pub variant_limits: VariantLimits,
    pub table: TableSettings,
    pub grouping_threshold: f64,
    pub json_retries: usize,
    pub llm: LlmConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            cache_dir: None,
            sort_inputs: false,
            variant_limits: VariantLimits {
                warn_threshold: VARIANT_WARN_THRESHOLD,
                hard_cap: DEFAULT_VARIANT_CAP,
            },
            table: TableSettings {
                overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
                table_class: TABLE_CLASS,
            },
            grouping_threshold: DEFAULT_GROUPING_THRESHOLD,
            json_retries: DEFAULT_JSON_RETRIES,
            llm: LlmConfig::default(),
        }
    }
}

impl Settings {
    /// Effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.clone())
    }

    /// Ensure output and cache directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [self.output_dir.clone(), self.cache_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", dir.display(), e),
                )
            })?;
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_inputs: Option<bool>,
    #[serde(default, skip_serializing_if = "MatchingConfig::is_default")]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Automatically discovers specsift config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("specsift").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config {}: {}", path.display(), e);
                            Self::default()
                        }
                    }
                } else {
                    Self::default()
                }
            }
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// The format follows the file extension (TOML, YAML, otherwise JSON).
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory of the config file, if loaded from one.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved against `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref dir) = self.output_dir {
            settings.output_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(ref dir) = self.cache_dir {
            settings.cache_dir = Some(self.resolve_path(dir, base_dir));
        }
        if let Some(sort) = self.sort_inputs {
            settings.sort_inputs = sort;
        }

        let m = &self.matching;
        if let Some(v) = m.overlap_threshold {
            settings.table.overlap_threshold = v;
        }
        if let Some(v) = m.table_class {
            settings.table.table_class = v;
        }
        if let Some(v) = m.variant_warn_threshold {
            settings.variant_limits.warn_threshold = v;
        }
        if let Some(v) = m.variant_cap {
            settings.variant_limits.hard_cap = v;
        }
        if let Some(v) = m.grouping_threshold {
            settings.grouping_threshold = v;
        }
        if let Some(v) = m.json_retries {
            settings.json_retries = v;
        }

        settings.llm = self.llm.clone();
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Output directory from the command line.
    pub output_dir: Option<PathBuf>,
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to load {}: {}; using defaults", path.display(), e);
            Config::default()
        }),
        None => Config::load().await,
    };

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = config.base_dir().unwrap_or_else(|| cwd.clone());

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    apply_env_overrides(&mut settings, &config, &cwd);

    if let Some(dir) = options.output_dir {
        settings.output_dir = dir;
    }

    (settings, config)
}

/// Environment variables take precedence over the config file.
fn apply_env_overrides(settings: &mut Settings, config: &Config, cwd: &Path) {
    if let Some(dir) = std::env::var("SPECSIFT_OUTPUT_DIR")
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using SPECSIFT_OUTPUT_DIR from environment: {}", dir);
        settings.output_dir = config.resolve_path(&dir, cwd);
    }
    settings.llm = settings.llm.clone().with_env_overrides();
}
