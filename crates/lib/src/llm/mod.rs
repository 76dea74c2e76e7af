//! Text-generation collaborator: the narrow seam the pipeline talks through.
//!
//! The pipeline only ever sends an instruction plus a payload and reads back
//! free text. Responses are expected (but not guaranteed) to contain a JSON
//! fragment; callers parse leniently via [`parse_json_fragment`] and must not
//! treat a malformed response as fatal.

mod ollama;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

pub use ollama::OllamaClient;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
}

/// A text-generation backend the pipeline can call.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Run one generation: `instructions` sets the task, `payload` is the text
    /// to work on. Returns the raw model output.
    async fn generate(&self, instructions: &str, payload: &str) -> Result<String, LlmError>;
}

/// Parse a JSON value of type `T` from model output. Tries the full text
/// first, then the region between the first `{` and the last `}`.
/// Returns `None` when neither parses.
pub fn parse_json_fragment<T: DeserializeOwned>(text: &str) -> Option<T> {
    if let Ok(v) = serde_json::from_str::<T>(text) {
        return Some(v);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<T>(&text[start..=end]).ok()
}
