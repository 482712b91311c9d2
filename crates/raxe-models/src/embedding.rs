//! Embedding model
//!
//! Runs the transformer embedding ONNX session and pools the token-level
//! hidden states into a single vector. Models exporting a pre-pooled
//! `[1, dim]` output are used as-is; `[1, seq, dim]` outputs are
//! attention-mask mean-pooled.

use crate::tokenizer::EncodedInput;
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use raxe_core::{Error, Result};
use std::path::Path;
use std::sync::Mutex;

/// Preferred output names, probed in order
const OUTPUT_NAMES: &[&str] = &["last_hidden_state", "sentence_embedding", "embeddings"];

/// The embedding half of a model package
#[derive(Debug)]
pub struct EmbeddingModel {
    session: Mutex<Session>,
    output_name: String,
    dim: usize,
}

impl EmbeddingModel {
    /// Load the embedding session from an ONNX file
    pub fn load(path: &Path, dim: usize, model_id: &str) -> Result<Self> {
        let session = create_session(path, model_id)?;

        let output_name = session
            .outputs
            .iter()
            .map(|o| o.name.clone())
            .find(|name| OUTPUT_NAMES.contains(&name.as_str()))
            .or_else(|| session.outputs.first().map(|o| o.name.clone()))
            .ok_or_else(|| Error::model_load(model_id, "embedding model declares no outputs"))?;

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            dim,
        })
    }

    /// Embedding dimensionality
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Produce a pooled embedding for one encoded input
    pub fn embed(&self, encoded: &EncodedInput) -> Result<Vec<f32>> {
        let seq_len = encoded.input_ids.len();

        let input_ids: Vec<i64> = encoded.input_ids.iter().map(|&x| x as i64).collect();
        let attention_mask: Vec<i64> = encoded.attention_mask.iter().map(|&x| x as i64).collect();

        let input_ids = Array2::from_shape_vec((1, seq_len), input_ids)
            .map_err(|e| Error::model_inference("embed", format!("input shape: {}", e)))?;
        let mask_array = Array2::from_shape_vec((1, seq_len), attention_mask)
            .map_err(|e| Error::model_inference("embed", format!("mask shape: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::model_inference("embed", "session lock poisoned"))?;

        let input_ids_tensor = TensorRef::from_array_view(&input_ids)
            .map_err(|e| Error::model_inference("embed", e.to_string()))?;
        let mask_tensor = TensorRef::from_array_view(&mask_array)
            .map_err(|e| Error::model_inference("embed", e.to_string()))?;

        let outputs = session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => mask_tensor,
            ])
            .map_err(|e| Error::model_inference("embed", e.to_string()))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::model_inference("embed", e.to_string()))?;
        let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();

        let pooled = match dims.as_slice() {
            // [1, dim] - already pooled by the exporter
            [1, _dim] => data.to_vec(),
            // [1, seq, dim] - mean over unmasked positions
            [1, seq, dim] => {
                let (seq, dim) = (*seq, *dim);
                let mut sums = vec![0.0f32; dim];
                let mut count = 0usize;
                for pos in 0..seq {
                    if encoded.attention_mask.get(pos).copied().unwrap_or(0) == 0 {
                        continue;
                    }
                    count += 1;
                    let row = &data[pos * dim..(pos + 1) * dim];
                    for (sum, value) in sums.iter_mut().zip(row) {
                        *sum += value;
                    }
                }
                let denom = count.max(1) as f32;
                sums.iter().map(|s| s / denom).collect()
            }
            other => {
                return Err(Error::model_inference(
                    "embed",
                    format!("unexpected embedding shape {:?}", other),
                ))
            }
        };

        if pooled.len() != self.dim {
            tracing::warn!(
                expected = self.dim,
                actual = pooled.len(),
                "embedding dimensionality differs from manifest"
            );
        }
        Ok(pooled)
    }
}

/// Build an ONNX session from a model file
pub(crate) fn create_session(path: &Path, model_id: &str) -> Result<Session> {
    Session::builder()
        .map_err(|e| Error::model_load(model_id, format!("session builder: {}", e)))?
        .with_intra_threads(num_cpus::get().max(1))
        .map_err(|e| Error::model_load(model_id, format!("session threads: {}", e)))?
        .commit_from_file(path)
        .map_err(|e| {
            Error::model_load(
                model_id,
                format!("failed to load '{}': {}", path.display(), e),
            )
        })
}
