//! Model catalog: context windows and per-1k-token pricing.
//!
//! The catalog is plain data handed to the stages that need it (annotator,
//! generation runner). `ModelCatalog::builtin()` is the reference table; tests
//! build their own.

use crate::error::{ExperimentError, Result};
use crate::records::TokenUsage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One chat model the experiment may target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    /// Maximum prompt size in tokens.
    pub context_window: usize,
    /// USD per 1000 prompt tokens.
    pub input_price_per_1k: f64,
    /// USD per 1000 completion tokens.
    pub output_price_per_1k: f64,
}

impl ModelSpec {
    pub fn new(id: &str, context_window: usize, input_price_per_1k: f64, output_price_per_1k: f64) -> Self {
        Self {
            id: id.to_string(),
            context_window,
            input_price_per_1k,
            output_price_per_1k,
        }
    }

    /// Estimated cost of sending `tokens` prompt tokens to this model.
    pub fn input_cost(&self, tokens: usize) -> f64 {
        self.input_price_per_1k * tokens as f64 / 1000.0
    }

    /// Estimated bill for one completed request.
    pub fn billed_estimate(&self, usage: &TokenUsage) -> f64 {
        let prompt = usage.prompt_tokens as f64 * self.input_price_per_1k / 1000.0;
        let completion = usage.completion_tokens as f64 * self.output_price_per_1k / 1000.0;
        prompt + completion
    }

    pub fn fits(&self, tokens: usize) -> bool {
        self.context_window >= tokens
    }
}

/// Ordered, immutable model table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    models: Vec<ModelSpec>,
}

impl ModelCatalog {
    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self { models }
    }

    /// Reference OpenAI table (USD, 2024-01-12).
    ///
    /// `gpt-3-32k` input is priced at 0.06 per 1k tokens for both annotation
    /// cost estimates and billing; earlier annotation runs priced it at 0.006.
    pub fn builtin() -> Self {
        Self::new(vec![
            ModelSpec::new("gpt-4-1106-preview", 128_000, 0.01, 0.03),
            ModelSpec::new("gpt-4-vision-preview", 128_000, 0.01, 0.03),
            ModelSpec::new("gpt-4", 8_192, 0.03, 0.06),
            ModelSpec::new("gpt-3-32k", 32_768, 0.06, 0.12),
            ModelSpec::new("gpt-3.5-turbo-1106", 16_385, 0.001, 0.002),
            ModelSpec::new("gpt-3.5-turbo-instruct", 4_096, 0.0015, 0.002),
        ])
    }

    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn require(&self, id: &str) -> Result<&ModelSpec> {
        self.get(id).ok_or_else(|| ExperimentError::UnknownModel {
            model: id.to_string(),
        })
    }

    /// Models whose context window holds `tokens` (a window equal to the count fits).
    pub fn supported_models(&self, tokens: usize) -> Vec<&ModelSpec> {
        self.models.iter().filter(|m| m.fits(tokens)).collect()
    }

    /// Per-model input cost for every supported model.
    pub fn input_cost_table(&self, tokens: usize) -> BTreeMap<String, f64> {
        self.supported_models(tokens)
            .into_iter()
            .map(|m| (m.id.clone(), m.input_cost(tokens)))
            .collect()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
