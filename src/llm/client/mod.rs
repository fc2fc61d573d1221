//! HTTP client for the LLM that writes lookup tables and regex guidance.
//!
//! Supports the Ollama generate API and OpenAI-compatible chat completions.

mod config;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub use config::{LlmConfig, LlmProvider};

use super::TextGenerator;

/// System prompt for chat providers. Every call expects a bare JSON object.
const JSON_SYSTEM_PROMPT: &str = "You are a JSON-specialized assistant with strict formatting rules. \
Your output MUST be valid JSON, quote all keys with double quotes, contain no duplicate keys, \
use arrays with uniform types, and escape special characters properly. \
Never include markdown, commentary, or explanations. Output only the JSON object.";

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    /// Model output could not be repaired into a JSON object.
    #[error("Invalid JSON from model: {0}")]
    InvalidJson(String),

    #[error("No valid JSON after {attempts} attempt(s)")]
    RetriesExhausted { attempts: usize },
}

/// LLM client.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { config, client }
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Check if the LLM service answers.
    pub async fn is_available(&self) -> bool {
        let url = match self.config.provider {
            LlmProvider::Ollama => format!("{}/api/tags", self.config.endpoint),
            LlmProvider::OpenAI => format!("{}/v1/models", self.config.endpoint),
        };
        let mut request = self.client.get(&url);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Call Ollama API with a prompt.
    async fn call_ollama(&self, prompt: &str) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let ollama_resp: OllamaResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        Ok(ollama_resp.response)
    }

    /// Call an OpenAI-compatible chat completions API.
    async fn call_chat(&self, prompt: &str) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: JSON_SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.config.endpoint);
        let mut builder = self.client.post(&url).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }

        let chat: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("Response had no choices".to_string()))
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        debug!(
            "Sending {} character prompt to {} ({:?})",
            prompt.len(),
            self.config.model,
            self.config.provider
        );
        match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(prompt).await,
            LlmProvider::OpenAI => self.call_chat(prompt).await,
        }
    }
}
