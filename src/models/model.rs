//! Model definitions and traits
//!
//! The embedding model is an opaque capability: a batch of strings goes in,
//! one fixed-length vector per string comes out. The ONNX implementation lives
//! here; tests substitute their own implementations of the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::models::{Embedding, EmbeddingResult};

/// Information about the loaded model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Maximum sequence length
    pub max_sequence_length: usize,
    /// Whether pooled vectors are L2-normalized
    pub normalized: bool,
    /// Model file path
    pub model_path: String,
    /// Tokenizer path
    pub tokenizer_path: String,
}

impl ModelInfo {
    pub fn from_config(config: &crate::models::config::ModelConfig) -> Self {
        Self {
            name: config.name.clone(),
            dimension: config.embedding_dimension,
            max_sequence_length: config.max_sequence_length,
            normalized: config.normalize,
            model_path: config.model_path.clone(),
            tokenizer_path: config.tokenizer_path.clone(),
        }
    }
}

/// Core embedding model trait
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Get model information
    fn info(&self) -> &ModelInfo;

    /// Generate embeddings for a batch of texts in a single call.
    ///
    /// Must return exactly one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>>;

    /// Get the embedding dimension
    fn dimension(&self) -> usize {
        self.info().dimension
    }
}

/// Lock a shared engine, taking the guard back if an earlier call panicked.
///
/// A panic inside one inference run leaves no partial state in the engine,
/// so later requests keep using it.
#[cfg_attr(not(feature = "onnx"), allow(dead_code))]
fn lock_engine<T>(engine: &Mutex<T>) -> MutexGuard<'_, T> {
    engine.lock().unwrap_or_else(|poisoned: PoisonError<MutexGuard<'_, T>>| {
        warn!("Engine lock was poisoned by an earlier panic, recovering");
        poisoned.into_inner()
    })
}

/// ONNX-based embedding model implementation
#[cfg(feature = "onnx")]
pub mod onnx {
    use super::*;
    use crate::models::config::ModelConfig;
    use crate::models::EmbeddingError;
    use crate::onnx::{OnnxConfig, OnnxEmbeddingEngine};
    use std::sync::Arc;
    use tracing::info;

    /// ONNX embedding model
    ///
    /// `Session::run` needs exclusive access, so the engine sits behind a
    /// mutex and every call runs on tokio's blocking pool.
    pub struct OnnxEmbeddingModel {
        info: ModelInfo,
        engine: Arc<Mutex<OnnxEmbeddingEngine>>,
    }

    impl OnnxEmbeddingModel {
        /// Load the ONNX graph and tokenizer, then check the output dimension
        /// against the configured one with a trial encode.
        pub async fn load(config: ModelConfig) -> EmbeddingResult<Self> {
            config.validate()?;

            let onnx_config = OnnxConfig::from_model_config(&config);
            let load_config = config.clone();
            let engine = tokio::task::spawn_blocking(move || {
                OnnxEmbeddingEngine::new(&load_config, &onnx_config)
            })
            .await
            .map_err(|e| EmbeddingError::ModelLoadFailed {
                error: format!("Model loading task failed: {}", e),
            })??;

            let model = Self {
                info: ModelInfo::from_config(&config),
                engine: Arc::new(Mutex::new(engine)),
            };

            let sample = model.embed_batch(&["dimension check".to_string()]).await?;
            let actual = sample.first().map(|v| v.len()).unwrap_or(0);
            if actual != config.embedding_dimension {
                return Err(EmbeddingError::ConfigError {
                    message: format!(
                        "Model '{}' produces {}-dimensional embeddings, config says {}",
                        config.name, actual, config.embedding_dimension
                    ),
                });
            }

            info!("Model '{}' ready ({} dimensions)", config.name, actual);
            Ok(model)
        }
    }

    #[async_trait]
    impl EmbeddingModel for OnnxEmbeddingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            let engine = Arc::clone(&self.engine);
            let texts = texts.to_vec();

            tokio::task::spawn_blocking(move || {
                let mut guard = lock_engine(&engine);
                guard.embed_texts(&texts)
            })
            .await
            .map_err(|e| EmbeddingError::EmbeddingFailed {
                error: format!("Inference task failed: {}", e),
            })?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedModel {
        info: ModelInfo,
    }

    #[async_trait]
    impl EmbeddingModel for FixedModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            Ok(texts.iter().map(|_| vec![0.0; self.info.dimension]).collect())
        }
    }

    #[test]
    fn test_poisoned_engine_lock_recovers() {
        let engine = std::sync::Arc::new(Mutex::new(vec![1.0f32]));

        let shared = std::sync::Arc::clone(&engine);
        let result = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("inference panicked");
        })
        .join();
        assert!(result.is_err());
        assert!(engine.is_poisoned());

        lock_engine(&engine).push(2.0);
        assert_eq!(*lock_engine(&engine), vec![1.0, 2.0]);
    }

    #[test]
    fn test_model_info_from_config() {
        let config = crate::models::config::ModelConfig::default();
        let info = ModelInfo::from_config(&config);

        assert_eq!(info.name, "sentence-transformers/all-mpnet-base-v2");
        assert_eq!(info.dimension, 768);
        assert!(info.normalized);
    }

    #[tokio::test]
    async fn test_dimension_defaults_to_info() {
        let mut info = ModelInfo::from_config(&crate::models::config::ModelConfig::default());
        info.dimension = 8;
        let model = FixedModel { info };

        assert_eq!(model.dimension(), 8);
        let out = model.embed_batch(&["a".to_string()]).await.unwrap();
        assert_eq!(out[0].len(), 8);
    }
}
