//! # ONNX Embedding Engine
//!
//! Sentence embeddings with ONNX Runtime and a HuggingFace tokenizer.
//!
//! Texts are tokenized in chunks of `batch_size` (padded to the longest
//! sequence in the chunk, truncated to the model's maximum), each chunk runs
//! through the graph in one session call, then tokens are mean-pooled over
//! the attention mask and L2-normalized. This is the sentence-transformers
//! pipeline for models such as all-mpnet-base-v2 and all-MiniLM-L6-v2.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let engine = OnnxEmbeddingEngine::new(&model_config, &OnnxConfig::from_model_config(&model_config))?;
//! let embeddings = engine.embed_texts(&["Hello world".to_string()])?;
//! ```

use crate::models::config::ModelConfig;
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};
use ndarray::ArrayView3;
#[cfg(feature = "onnx")]
use ort::session::{builder::GraphOptimizationLevel, Session};
#[cfg(feature = "onnx")]
use ort::value::Tensor;
#[cfg(feature = "onnx")]
use tokenizers::{PaddingStrategy, Tokenizer, TruncationParams};
#[cfg(feature = "onnx")]
use tracing::{debug, info, instrument};

/// Configuration for ONNX Runtime
#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// Path to ONNX Runtime library (DLL/so/dylib); empty means default lookup
    pub library_path: String,
    /// Thread pool size for inference
    pub thread_pool_size: usize,
}

impl Default for OnnxConfig {
    fn default() -> Self {
        Self {
            library_path: String::new(),
            thread_pool_size: 4,
        }
    }
}

impl OnnxConfig {
    pub fn from_model_config(config: &ModelConfig) -> Self {
        Self {
            library_path: config.onnx_runtime_path.clone().unwrap_or_default(),
            thread_pool_size: config.num_threads,
        }
    }
}

/// ONNX-based embedding engine for generating text embeddings
#[cfg(feature = "onnx")]
#[derive(Debug)]
pub struct OnnxEmbeddingEngine {
    /// ONNX Runtime session for model inference
    session: Session,
    /// HuggingFace tokenizer, configured for batch padding and truncation
    tokenizer: Tokenizer,
    /// Graph output holding `[batch, seq, hidden]` token embeddings
    output_name: String,
    /// Whether the graph takes `token_type_ids` (BERT does, MPNet does not)
    wants_token_type_ids: bool,
    normalize: bool,
    /// Texts per session run; bounds tensor memory for large requests
    batch_size: usize,
}

#[cfg(feature = "onnx")]
impl OnnxEmbeddingEngine {
    /// Create a new ONNX embedding engine
    ///
    /// # Arguments
    /// * `model_config` - Paths, sequence length and pooling settings
    /// * `onnx_config` - ONNX Runtime configuration
    pub fn new(model_config: &ModelConfig, onnx_config: &OnnxConfig) -> EmbeddingResult<Self> {
        info!(
            "Initializing ONNX embedding engine with model: {}",
            model_config.model_path
        );

        if !onnx_config.library_path.is_empty() {
            std::env::set_var("ORT_DYLIB_PATH", &onnx_config.library_path);
            debug!("Set ORT_DYLIB_PATH to: {}", onnx_config.library_path);
        }

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(onnx_config.thread_pool_size)?
            .commit_from_file(&model_config.model_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load ONNX model: {}", e),
            })?;

        let mut tokenizer = Tokenizer::from_file(&model_config.tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to load tokenizer: {}", e),
            })?;

        // Keep the tokenizer's own pad token, only force batch-longest padding
        let mut padding = tokenizer.get_padding().cloned().unwrap_or_default();
        padding.strategy = PaddingStrategy::BatchLongest;
        tokenizer.with_padding(Some(padding));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: model_config.max_sequence_length,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Failed to configure truncation: {}", e),
            })?;

        let input_names: Vec<&str> = session.inputs.iter().map(|i| i.name.as_str()).collect();
        for required in ["input_ids", "attention_mask"] {
            if !input_names.contains(&required) {
                return Err(EmbeddingError::ModelLoadFailed {
                    error: format!("Model graph has no '{}' input (inputs: {:?})", required, input_names),
                });
            }
        }
        let wants_token_type_ids = input_names.contains(&"token_type_ids");

        if !session.outputs.iter().any(|o| o.name == model_config.output_name) {
            return Err(EmbeddingError::ModelLoadFailed {
                error: format!("Model graph has no '{}' output", model_config.output_name),
            });
        }

        info!(
            "ONNX embedding engine initialized with {} threads (token_type_ids: {})",
            onnx_config.thread_pool_size, wants_token_type_ids
        );
        Ok(Self {
            session,
            tokenizer,
            output_name: model_config.output_name.clone(),
            wants_token_type_ids,
            normalize: model_config.normalize,
            batch_size: model_config.batch_size,
        })
    }

    /// Generate embeddings for a batch of texts
    ///
    /// The batch is run through the session `batch_size` texts at a time.
    /// Returns one vector per input text, in input order.
    #[instrument(skip(self, texts), fields(text_count = texts.len()))]
    pub fn embed_texts(&mut self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Err(EmbeddingError::InvalidInput {
                message: "Cannot embed empty text list".to_string(),
            });
        }

        let batch_size = self.batch_size;
        embed_in_chunks(texts, batch_size, |chunk| self.run_chunk(chunk))
    }

    /// Tokenize one chunk and run it through the session
    fn run_chunk(&mut self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Tokenization failed: {}", e),
            })?;

        let batch_size = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);
        debug!("Tokenized {} texts to sequence length {}", batch_size, seq_len);

        let mut input_ids = Vec::with_capacity(batch_size * seq_len);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_len);
        for encoding in &encodings {
            input_ids.extend(encoding.get_ids().iter().map(|&x| x as i64));
            attention_mask.extend(encoding.get_attention_mask().iter().map(|&x| x as i64));
        }
        if input_ids.len() != batch_size * seq_len {
            return Err(EmbeddingError::EmbeddingFailed {
                error: "Tokenizer produced ragged batch despite padding".to_string(),
            });
        }

        let shape = [batch_size as i64, seq_len as i64];
        let tensor_error = |name: &str, e: ort::Error| EmbeddingError::EmbeddingFailed {
            error: format!("Failed to create {} tensor: {}", name, e),
        };

        let mut inputs = vec![
            (
                "input_ids",
                Tensor::from_array((shape, input_ids)).map_err(|e| tensor_error("input_ids", e))?,
            ),
            (
                "attention_mask",
                Tensor::from_array((shape, attention_mask.clone()))
                    .map_err(|e| tensor_error("attention_mask", e))?,
            ),
        ];
        if self.wants_token_type_ids {
            inputs.push((
                "token_type_ids",
                Tensor::from_array((shape, vec![0i64; batch_size * seq_len]))
                    .map_err(|e| tensor_error("token_type_ids", e))?,
            ));
        }

        let outputs = self
            .session
            .run(inputs)
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("ONNX inference failed: {}", e),
            })?;

        let (out_shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Failed to extract output tensor: {}", e),
            })?;

        let dims: Vec<usize> = out_shape.iter().map(|&x| x as usize).collect();
        if dims.len() != 3 {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!("Expected 3D output tensor, got {}D", dims.len()),
            });
        }
        let hidden = ArrayView3::from_shape((dims[0], dims[1], dims[2]), data).map_err(|e| {
            EmbeddingError::EmbeddingFailed {
                error: format!("Failed to create output array view: {:?}", e),
            }
        })?;

        let pooled = mean_pooling(&hidden, &attention_mask)?;
        let embeddings = if self.normalize {
            pooled.into_iter().map(l2_normalize).collect()
        } else {
            pooled
        };

        debug!("Generated {} embeddings", embeddings.len());
        Ok(embeddings)
    }
}

/// Run `run` over consecutive chunks of at most `batch_size` texts and
/// concatenate the results in input order.
///
/// Each chunk must yield exactly one vector per text.
pub fn embed_in_chunks<F>(texts: &[String], batch_size: usize, mut run: F) -> EmbeddingResult<Vec<Embedding>>
where
    F: FnMut(&[String]) -> EmbeddingResult<Vec<Embedding>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());

    for chunk in texts.chunks(batch_size.max(1)) {
        let chunk_embeddings = run(chunk)?;
        if chunk_embeddings.len() != chunk.len() {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!(
                    "Chunk of {} texts produced {} embeddings",
                    chunk.len(),
                    chunk_embeddings.len()
                ),
            });
        }
        embeddings.extend(chunk_embeddings);
    }

    Ok(embeddings)
}

/// Mean of token embeddings over positions whose attention mask is set.
///
/// `hidden` is `[batch, seq, hidden]`; `attention_mask` is row-major
/// `[batch, seq]`. A row with no unmasked tokens pools to a zero vector.
pub fn mean_pooling(hidden: &ArrayView3<f32>, attention_mask: &[i64]) -> EmbeddingResult<Vec<Embedding>> {
    let (batch_size, seq_len, hidden_size) = hidden.dim();

    if attention_mask.len() != batch_size * seq_len {
        return Err(EmbeddingError::EmbeddingFailed {
            error: format!(
                "Attention mask length {} doesn't match output shape [{}, {}]",
                attention_mask.len(),
                batch_size,
                seq_len
            ),
        });
    }

    let mut pooled = Vec::with_capacity(batch_size);
    for (b, mask) in attention_mask.chunks(seq_len.max(1)).enumerate().take(batch_size) {
        let mut sum = vec![0.0f32; hidden_size];
        let mut valid_tokens = 0usize;

        for (s, &m) in mask.iter().enumerate() {
            if m == 0 {
                continue;
            }
            for (h, acc) in sum.iter_mut().enumerate() {
                *acc += hidden[[b, s, h]];
            }
            valid_tokens += 1;
        }

        if valid_tokens > 0 {
            for val in &mut sum {
                *val /= valid_tokens as f32;
            }
        }
        pooled.push(sum);
    }

    Ok(pooled)
}

/// L2-normalize a vector; a zero vector is returned unchanged.
pub fn l2_normalize(mut embedding: Embedding) -> Embedding {
    let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut embedding {
            *val /= norm;
        }
    }
    embedding
}
