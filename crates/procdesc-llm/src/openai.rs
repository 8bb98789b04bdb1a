//! OpenAI chat-completions client (blocking).

use crate::{DescriptionGenerator, Generation, GenerationError, GenerationRequest, Usage};
use serde_json::json;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

impl OpenAiConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// `OPENAI_API_KEY` (required) and `OPENAI_BASE_URL` (optional).
    pub fn from_env() -> Result<Self, GenerationError> {
        let key = std::env::var(OPENAI_API_KEY_ENV).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(GenerationError::Config(format!(
                "{OPENAI_API_KEY_ENV} is not set"
            )));
        }
        let mut config = Self::new(key);
        if let Ok(url) = std::env::var(OPENAI_BASE_URL_ENV) {
            if !url.trim().is_empty() {
                config.base_url = url.trim().to_string();
            }
        }
        Ok(config)
    }

    /// `<base>/v1/chat/completions`, tolerating a trailing `/` or `/v1` on the base.
    pub fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/chat/completions")
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct OpenAiChatClient {
    client: reqwest::blocking::Client,
    config: OpenAiConfig,
}

impl OpenAiChatClient {
    /// Requests block until the service answers; no timeout is applied.
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| GenerationError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self, GenerationError> {
        Self::new(OpenAiConfig::from_env()?)
    }
}

/// JSON body for one chat-completions call.
pub fn request_body(request: &GenerationRequest) -> serde_json::Value {
    json!({
        "model": request.model,
        "temperature": request.temperature,
        "seed": request.seed,
        "messages": [
            { "role": "system", "content": request.system },
            { "role": "user", "content": request.user },
        ],
    })
}

/// Pull the first choice's text and the usage block out of a response.
pub fn parse_response(data: &serde_json::Value) -> Result<Generation, GenerationError> {
    let text = data["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| GenerationError::InvalidResponse("missing choices[0].message.content".to_string()))?
        .to_string();

    let usage = &data["usage"];
    let field = |name: &str| -> Result<usize, GenerationError> {
        usage[name]
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| GenerationError::InvalidResponse(format!("missing usage.{name}")))
    };
    let prompt_tokens = field("prompt_tokens")?;
    let completion_tokens = field("completion_tokens")?;
    let total_tokens = usage["total_tokens"]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or(prompt_tokens + completion_tokens);

    Ok(Generation {
        text,
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        },
    })
}

impl DescriptionGenerator for OpenAiChatClient {
    fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        let url = self.config.chat_completions_url();
        tracing::debug!(model = %request.model, temperature = request.temperature, "chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request_body(request))
            .send()
            .map_err(|e| GenerationError::Network(format!("failed to reach {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let data: serde_json::Value = response
            .json()
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
        parse_response(&data)
    }
}
