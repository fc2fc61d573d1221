//! LLM collaborator: text generation, prompts and JSON repair.
//!
//! The extraction core only needs "prompt in, text out". [`TextGenerator`]
//! is that seam; [`LlmClient`] implements it over HTTP and tests script it.

mod client;
pub mod json;
pub mod prompts;

use async_trait::async_trait;

pub use client::{LlmClient, LlmConfig, LlmError, LlmProvider};
pub use json::{generate_valid_json, lenient_parse, DEFAULT_JSON_RETRIES};

/// Anything that can complete a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Return the complete response for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
