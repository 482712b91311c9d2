//! Classifier heads
//!
//! Each head is a small ONNX classifier over the pooled embedding,
//! exported scikit-learn style with two outputs: `output_label` (the
//! predicted class as int64) and `output_probability` (per-class
//! probabilities as float32, zipmap disabled). Both outputs are parsed;
//! a missing probability tensor degrades to the label alone.

use crate::embedding::create_session;
use crate::labels::LabelEncoders;
use ndarray::Array2;
use ort::session::Session;
use ort::value::TensorRef;
use raxe_core::{Error, Result};
use std::path::Path;
use std::sync::Mutex;

/// Output carrying the predicted class
const LABEL_OUTPUT: &str = "output_label";
/// Output carrying per-class probabilities
const PROBABILITY_OUTPUT: &str = "output_probability";

/// A single head's prediction
#[derive(Debug, Clone, PartialEq)]
pub struct HeadPrediction {
    /// Head name, e.g. `binary`
    pub head: String,

    /// Decoded label
    pub label: String,

    /// Confidence of the predicted class
    pub confidence: f64,

    /// Full per-class probability vector, when the model provides one
    pub scores: Vec<f32>,
}

/// One classifier head backed by an ONNX session
#[derive(Debug)]
pub struct ClassifierHead {
    name: String,
    session: Mutex<Session>,
    input_name: String,
}

impl ClassifierHead {
    /// Load a head from its ONNX file
    pub fn load(name: &str, path: &Path, model_id: &str) -> Result<Self> {
        let session = create_session(path, model_id)?;
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        Ok(Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
        })
    }

    /// Head name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Classify a pooled embedding
    pub fn predict(&self, embedding: &[f32], encoders: &LabelEncoders) -> Result<HeadPrediction> {
        let features = Array2::from_shape_vec((1, embedding.len()), embedding.to_vec())
            .map_err(|e| Error::model_inference(&self.name, format!("input shape: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| Error::model_inference(&self.name, "session lock poisoned"))?;

        let features_tensor = TensorRef::from_array_view(&features)
            .map_err(|e| Error::model_inference(&self.name, e.to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => features_tensor])
            .map_err(|e| Error::model_inference(&self.name, e.to_string()))?;

        let (_, labels) = outputs[LABEL_OUTPUT]
            .try_extract_tensor::<i64>()
            .map_err(|e| Error::model_inference(&self.name, format!("{}: {}", LABEL_OUTPUT, e)))?;
        let class = labels
            .first()
            .copied()
            .ok_or_else(|| Error::model_inference(&self.name, "empty label output"))?;

        // The probability output is present under the dual-output export
        // convention; tolerate models that strip it.
        let scores: Vec<f32> = outputs
            .get(PROBABILITY_OUTPUT)
            .and_then(|value| value.try_extract_tensor::<f32>().ok())
            .map(|(_, data)| data.to_vec())
            .unwrap_or_default();

        let scores = normalize_scores(scores);
        let confidence = scores
            .get(class.max(0) as usize)
            .copied()
            .map(f64::from)
            .unwrap_or(1.0);

        Ok(HeadPrediction {
            head: self.name.clone(),
            label: encoders.decode(&self.name, class),
            confidence,
            scores,
        })
    }
}

/// Softmax raw scores when they are not already a probability simplex
fn normalize_scores(scores: Vec<f32>) -> Vec<f32> {
    if scores.is_empty() {
        return scores;
    }
    let sum: f32 = scores.iter().sum();
    let in_range = scores.iter().all(|&s| (0.0..=1.0).contains(&s));
    if in_range && (sum - 1.0).abs() < 0.01 {
        return scores;
    }

    let max = scores.iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let denom: f32 = exp.iter().sum();
    exp.iter().map(|&e| e / denom).collect()
}
