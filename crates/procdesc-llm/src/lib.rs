//! Text generation for procdesc
//!
//! The experiment treats the language model as a black box: model id,
//! temperature, seed and two text blocks in; generated text and token usage
//! out. `DescriptionGenerator` is that box. The OpenAI chat client is the
//! production implementation; tests plug in their own.

use serde::{Deserialize, Serialize};

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "openai")]
pub use openai::{OpenAiChatClient, OpenAiConfig};

// ============================================================================
// Request / response
// ============================================================================

/// One description request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub model: String,
    pub temperature: f64,
    pub seed: u64,
    /// Sent as the system message (the prompt text).
    pub system: String,
    /// Sent as the user message (the serialized diagram).
    pub user: String,
}

/// Token accounting as reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    pub text: String,
    pub usage: Usage,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Generator interface
// ============================================================================

/// Blocking text generation. Errors are not retried by callers.
pub trait DescriptionGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError>;
}

impl<G: DescriptionGenerator + ?Sized> DescriptionGenerator for &G {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        (**self).generate(request)
    }
}

impl<G: DescriptionGenerator + ?Sized> DescriptionGenerator for Box<G> {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        (**self).generate(request)
    }
}
