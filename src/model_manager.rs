use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::error::{Error, Result};

/// PyLate port of `colbert-ir/colbertv2.0`.
pub const DEFAULT_MODEL_ID: &str = "lightonai/colbertv2.0";
pub const MODEL_ENV_VAR: &str = "CHATBERT_MODEL";

/// Turns text into per-token late-interaction embeddings.
///
/// [`ModelManager`] is the production implementation; anything that can
/// produce token matrices of a fixed dimension can stand in for it.
pub trait Encoder {
    /// Identifier of the underlying model, recorded in index manifests.
    fn model_id(&self) -> &str;

    /// Encode documents into a `[batch, tokens, dim]` tensor.
    fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor>;

    /// Encode one query into a `[tokens, dim]` tensor.
    fn encode_query(&mut self, query: &str) -> Result<Tensor>;
}

/// Select the best available compute device.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Owns the ColBERT model, loading it lazily on first use.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Resolve the model ID from `CHATBERT_MODEL`, falling back to
    /// [`DEFAULT_MODEL_ID`]. Nothing is loaded yet.
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());
        Self::with_model_id(model_id)
    }

    /// Use an explicit model ID (HuggingFace repo or local path).
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// `--model` wins over the environment.
    pub fn resolve(explicit: Option<&str>) -> Self {
        match explicit {
            Some(id) => Self::with_model_id(id.to_string()),
            None => Self::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            tracing::info!(model = %self.model_id, "loading ColBERT model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(default_device())
                .try_into()
                .map_err(|e| {
                    Error::Model(format!(
                        "failed to load {}: {e}",
                        self.model_id
                    ))
                })?;
            self.model = Some(colbert);
        }

        self.model
            .as_mut()
            .ok_or_else(|| Error::Model("model not loaded".to_string()))
    }
}

impl Encoder for ModelManager {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        model
            .encode(texts, false)
            .map_err(|e| Error::Model(format!("document encoding failed: {e}")))
    }

    fn encode_query(&mut self, query: &str) -> Result<Tensor> {
        let model = self.ensure_loaded()?;
        let embeddings = model
            .encode(&[query.to_string()], true)
            .map_err(|e| Error::Model(format!("query encoding failed: {e}")))?;
        // [1, Q, D] -> [Q, D]
        Ok(embeddings.squeeze(0)?)
    }
}

/// Deterministic bag-of-words encoder for tests: every word becomes a
/// one-hot vector at a hashed position.
#[cfg(test)]
pub(crate) mod test_encoder {
    use candle_core::{Device, Tensor};

    use super::Encoder;
    use crate::error::Result;

    pub const DIM: usize = 512;

    #[derive(Debug, Default)]
    pub struct WordHashEncoder;

    fn slot(word: &str) -> usize {
        let hash = word.bytes().fold(0xcbf29ce484222325u64, |h, b| {
            (h ^ u64::from(b)).wrapping_mul(0x100000001b3)
        });
        (hash % DIM as u64) as usize
    }

    fn rows(text: &str) -> Vec<Vec<f32>> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut row = vec![0.0; DIM];
                row[slot(&w.to_lowercase())] = 1.0;
                row
            })
            .collect()
    }

    impl Encoder for WordHashEncoder {
        fn model_id(&self) -> &str {
            "test/word-hash"
        }

        fn encode_documents(&mut self, texts: &[String]) -> Result<Tensor> {
            let all: Vec<_> = texts.iter().map(|t| rows(t)).collect();
            let max_tokens = all.iter().map(Vec::len).max().unwrap_or(0).max(1);
            let mut flat = Vec::with_capacity(texts.len() * max_tokens * DIM);
            for doc in &all {
                for row in doc {
                    flat.extend_from_slice(row);
                }
                flat.resize(flat.len() + (max_tokens - doc.len()) * DIM, 0.0);
            }
            Ok(Tensor::from_vec(
                flat,
                (texts.len(), max_tokens, DIM),
                &Device::Cpu,
            )?)
        }

        fn encode_query(&mut self, query: &str) -> Result<Tensor> {
            let mut q = rows(query);
            if q.is_empty() {
                q.push(vec![0.0; DIM]);
            }
            let n = q.len();
            Ok(Tensor::from_vec(q.concat(), (n, DIM), &Device::Cpu)?)
        }
    }
}
