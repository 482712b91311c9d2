//! Tokenization for the embedding model
//!
//! Wraps a `tokenizers` tokenizer with fixed-window semantics: ids are
//! truncated to the model's max length and padded with an attention mask
//! so every encode yields tensors of the same shape.

use raxe_core::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;

/// An encoded input: ids and attention mask, both `max_length` long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedInput {
    /// Token ids, padded with 0
    pub input_ids: Vec<u32>,

    /// 1 for real tokens, 0 for padding
    pub attention_mask: Vec<u32>,
}

/// Tokenizer wrapper with truncation and padding
#[derive(Debug)]
pub struct TokenizerWrapper {
    tokenizer: Arc<Tokenizer>,
    max_length: usize,
}

impl TokenizerWrapper {
    /// Load a tokenizer JSON file
    pub fn load(path: &Path, max_length: usize, model_id: &str) -> Result<Self> {
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            Error::model_load(model_id, format!("failed to load tokenizer: {}", e))
        })?;
        Ok(Self {
            tokenizer: Arc::new(tokenizer),
            max_length,
        })
    }

    /// Wrap an existing tokenizer instance
    pub fn from_tokenizer(tokenizer: Tokenizer, max_length: usize) -> Self {
        Self {
            tokenizer: Arc::new(tokenizer),
            max_length,
        }
    }

    /// Encode text into a fixed-length window with attention mask
    pub fn encode(&self, text: &str) -> Result<EncodedInput> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::model_inference("tokenize", e.to_string()))?;

        let mut input_ids = encoding.get_ids().to_vec();
        if input_ids.len() > self.max_length {
            input_ids.truncate(self.max_length);
        }

        let mut attention_mask = vec![1u32; input_ids.len()];
        while input_ids.len() < self.max_length {
            input_ids.push(0);
            attention_mask.push(0);
        }

        Ok(EncodedInput {
            input_ids,
            attention_mask,
        })
    }

    /// Maximum sequence length
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Vocabulary size including added tokens
    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}
