//! Token counting seam.

use tiktoken_rs::CoreBPE;

/// Counts model tokens in a text.
pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to load tokenizer: {0}")]
pub struct TokenizerError(String);

/// GPT-2 byte-level BPE (`r50k_base`).
pub struct Gpt2TokenCounter {
    bpe: CoreBPE,
}

impl Gpt2TokenCounter {
    pub fn new() -> Result<Self, TokenizerError> {
        let bpe = tiktoken_rs::r50k_base().map_err(|e| TokenizerError(e.to_string()))?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for Gpt2TokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count(&self, text: &str) -> usize {
        (**self).count(text)
    }
}
