//! LLM client configuration.

use serde::{Deserialize, Serialize};

/// LLM provider type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Ollama API (local, default)
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions API (OpenAI, Groq, llama.cpp server, ...)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" | "llamacpp" => Some(Self::OpenAI),
            _ => None,
        }
    }
}

/// Configuration for the LLM client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (ollama or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API base URL (provider-specific defaults apply)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key for OpenAI-compatible providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `SPECSIFT_LLM_PROVIDER`: "ollama" (default), "openai", "groq", "together" or "llamacpp"
    /// - `SPECSIFT_LLM_ENDPOINT`: API base URL
    /// - `SPECSIFT_LLM_API_KEY`: API key for OpenAI-compatible providers
    /// - `SPECSIFT_LLM_MODEL`: Model name
    ///
    /// When the provider is set but the endpoint is not, the provider's
    /// public endpoint is used. `OPENAI_API_KEY` / `GROQ_API_KEY` fill in a
    /// missing key for those providers.
    pub fn with_env_overrides(mut self) -> Self {
        let explicit_provider = std::env::var("SPECSIFT_LLM_PROVIDER").ok();
        if let Some(provider) = explicit_provider.as_deref().and_then(LlmProvider::from_str) {
            self.provider = provider;
        }

        let explicit_endpoint = std::env::var("SPECSIFT_LLM_ENDPOINT").ok();
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = endpoint.clone();
        }

        if let Ok(val) = std::env::var("SPECSIFT_LLM_API_KEY") {
            self.api_key = Some(val);
        }

        if let Some(provider_str) = explicit_provider {
            let provider_lower = provider_str.to_lowercase();
            if explicit_endpoint.is_none() {
                match provider_lower.as_str() {
                    "groq" => self.endpoint = "https://api.groq.com/openai".to_string(),
                    "openai" => self.endpoint = "https://api.openai.com".to_string(),
                    "together" => self.endpoint = "https://api.together.xyz".to_string(),
                    _ => {}
                }
            }
            if self.api_key.is_none() {
                match provider_lower.as_str() {
                    "groq" => self.api_key = std::env::var("GROQ_API_KEY").ok(),
                    "openai" => self.api_key = std::env::var("OPENAI_API_KEY").ok(),
                    _ => {}
                }
            }
        }

        if let Ok(val) = std::env::var("SPECSIFT_LLM_MODEL") {
            self.model = val;
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}
