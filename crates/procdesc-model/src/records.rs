//! Typed records persisted between pipeline stages.
//!
//! Field names are the on-disk JSON keys; downstream tooling reads them.

use crate::uid::TestcaseUid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Sampling seed sent with every generation request.
pub const GENERATION_SEED: u64 = 123;

/// Per-subtype element counts (`"task" -> 3`, `"exclusiveGateway" -> 1`, ...).
pub type TypeCounts = BTreeMap<String, usize>;

/// Structural metrics, token count and model fit of one source diagram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramAnnotation {
    /// The diagram's declared id (root `id` attribute).
    pub model_id: String,
    pub serialized_model: String,
    pub activities_count: usize,
    pub events_count: usize,
    pub gateways_count: usize,
    pub type_activities_count: TypeCounts,
    pub type_events_count: TypeCounts,
    pub type_gateways_count: TypeCounts,
    /// Coefficient of network complexity.
    pub cnc: f64,
    /// Durfee square metric.
    pub durfee: usize,
    pub nodes_count: usize,
    pub sequence_flows_count: usize,
    pub pools_count: usize,
    pub lanes_count: usize,
    pub tokens_count: usize,
    pub characters_count: usize,
    pub supported_chatgpt_models: Vec<String>,
    pub chatgpt_model_pricings_usd: BTreeMap<String, f64>,
    /// Source directory of the diagram.
    pub dir: PathBuf,
}

/// A prompt file: its file name and full text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub name: String,
    pub text: String,
}

/// One diagram x prompt x temperature x model combination.
///
/// Only lives in memory; its persisted trace is `Parameters` + `GenerationResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct Testcase {
    pub dataset_name: String,
    pub annotation: DiagramAnnotation,
    pub prompt: Prompt,
    pub temperature: f64,
    pub chatgpt_model: String,
}

impl Testcase {
    pub fn parameters(&self, uid: TestcaseUid) -> Parameters {
        Parameters {
            model_id: self.annotation.model_id.clone(),
            dataset_name: self.dataset_name.clone(),
            prompt: self.prompt.text.clone(),
            temperature: self.temperature,
            chatgpt_model: self.chatgpt_model.clone(),
            seed: GENERATION_SEED,
            prompt_name: self.prompt.name.clone(),
            uid,
        }
    }
}

/// `parameters.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub model_id: String,
    pub dataset_name: String,
    pub prompt: String,
    pub temperature: f64,
    pub chatgpt_model: String,
    pub seed: u64,
    pub prompt_name: String,
    pub uid: TestcaseUid,
}

/// Token usage reported by the generation service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl TokenUsage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// `generation_result.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub generated_description: String,
    pub real_prompt_tokens: usize,
    pub real_completion_tokens: usize,
    pub real_total_tokens: usize,
    pub billed_estimate: f64,
}

impl GenerationResult {
    pub fn new(text: String, usage: TokenUsage, billed_estimate: f64) -> Self {
        Self {
            generated_description: text,
            real_prompt_tokens: usage.prompt_tokens,
            real_completion_tokens: usage.completion_tokens,
            real_total_tokens: usage.total_tokens,
            billed_estimate,
        }
    }
}

/// `basic_eval.json`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicEvaluation {
    pub sent_count: usize,
    pub word_count: usize,
}
