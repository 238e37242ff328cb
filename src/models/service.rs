//! Embedding Service
//!
//! Owns the single loaded model for the lifetime of the process and exposes
//! the one operation the server needs: embed an ordered batch of strings.

use std::sync::Arc;
use tracing::debug;

use crate::models::model::{EmbeddingModel, ModelInfo};
use crate::models::{Embedding, EmbeddingError, EmbeddingResult};

/// Batch embedding over one shared, read-only model
#[derive(Clone)]
pub struct EmbeddingService {
    model: Arc<dyn EmbeddingModel>,
}

impl EmbeddingService {
    /// Create a service around an already-loaded model
    pub fn new(model: Arc<dyn EmbeddingModel>) -> Self {
        Self { model }
    }

    /// Information about the loaded model
    pub fn model_info(&self) -> &ModelInfo {
        self.model.info()
    }

    /// Output dimension of every embedding this service returns
    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    /// Embed `inputs` in order.
    ///
    /// An empty batch returns immediately without touching the model. A
    /// non-empty batch goes to the model in one call; the result has one
    /// vector per input, all of the same dimension.
    pub async fn embed(&self, inputs: &[String]) -> EmbeddingResult<Vec<Embedding>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Embedding batch of {} inputs", inputs.len());
        let embeddings = self.model.embed_batch(inputs).await?;

        if embeddings.len() != inputs.len() {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!(
                    "Model returned {} embeddings for {} inputs",
                    embeddings.len(),
                    inputs.len()
                ),
            });
        }

        let dimension = self.dimension();
        if let Some((index, embedding)) = embeddings
            .iter()
            .enumerate()
            .find(|(_, e)| e.len() != dimension)
        {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!(
                    "Embedding {} has {} dimensions, expected {}",
                    index,
                    embedding.len(),
                    dimension
                ),
            });
        }

        // NaN and infinity have no JSON encoding
        if let Some(index) = embeddings
            .iter()
            .position(|e| e.iter().any(|v| !v.is_finite()))
        {
            return Err(EmbeddingError::EmbeddingFailed {
                error: format!("Embedding {} contains non-finite values", index),
            });
        }

        Ok(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::ModelConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn info(dimension: usize) -> ModelInfo {
        let mut info = ModelInfo::from_config(&ModelConfig::default());
        info.dimension = dimension;
        info
    }

    /// Encodes each text as [len, first byte, call index]
    struct PositionalModel {
        info: ModelInfo,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingModel for PositionalModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as f32;
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, t.bytes().next().unwrap_or(0) as f32, call])
                .collect())
        }
    }

    struct NeverCalledModel {
        info: ModelInfo,
    }

    #[async_trait]
    impl EmbeddingModel for NeverCalledModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, _texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            panic!("model must not be invoked for an empty batch");
        }
    }

    struct FailingModel {
        info: ModelInfo,
    }

    #[async_trait]
    impl EmbeddingModel for FailingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, _texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            Err(EmbeddingError::EmbeddingFailed {
                error: "injected fault".to_string(),
            })
        }
    }

    /// Drops the last embedding and returns a short vector first
    struct MisbehavingModel {
        info: ModelInfo,
        drop_last: bool,
    }

    #[async_trait]
    impl EmbeddingModel for MisbehavingModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            let mut out: Vec<Embedding> = texts.iter().map(|_| vec![1.0; self.info.dimension]).collect();
            if self.drop_last {
                out.pop();
            } else if let Some(first) = out.first_mut() {
                first.pop();
            }
            Ok(out)
        }
    }

    fn positional() -> (Arc<PositionalModel>, EmbeddingService) {
        let model = Arc::new(PositionalModel {
            info: info(3),
            calls: AtomicUsize::new(0),
        });
        let service = EmbeddingService::new(model.clone());
        (model, service)
    }

    #[tokio::test]
    async fn test_empty_batch_skips_model() {
        let service = EmbeddingService::new(Arc::new(NeverCalledModel { info: info(768) }));
        let out = service.embed(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_length_and_dimension() {
        let (_, service) = positional();
        for n in [1usize, 2, 7, 64] {
            let inputs: Vec<String> = (0..n).map(|i| format!("text {}", i)).collect();
            let out = service.embed(&inputs).await.unwrap();
            assert_eq!(out.len(), n);
            assert!(out.iter().all(|v| v.len() == service.dimension()));
        }
    }

    #[tokio::test]
    async fn test_order_preserved() {
        let (_, service) = positional();
        let inputs = vec!["a".to_string(), "bb".to_string()];
        let out = service.embed(&inputs).await.unwrap();

        assert_eq!(out[0][0], 1.0);
        assert_eq!(out[0][1], b'a' as f32);
        assert_eq!(out[1][0], 2.0);
        assert_eq!(out[1][1], b'b' as f32);
    }

    #[tokio::test]
    async fn test_single_model_call_per_batch() {
        let (model, service) = positional();
        let inputs: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        service.embed(&inputs).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        service.embed(&[]).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_model_fault_propagates() {
        let service = EmbeddingService::new(Arc::new(FailingModel { info: info(4) }));
        let err = service.embed(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmbeddingFailed { .. }));
    }

    #[tokio::test]
    async fn test_wrong_count_rejected() {
        let service = EmbeddingService::new(Arc::new(MisbehavingModel {
            info: info(4),
            drop_last: true,
        }));
        let inputs = vec!["a".to_string(), "b".to_string()];
        assert!(service.embed(&inputs).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_dimension_rejected() {
        let service = EmbeddingService::new(Arc::new(MisbehavingModel {
            info: info(4),
            drop_last: false,
        }));
        let err = service.embed(&["a".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("expected 4"));
    }

    /// Returns `value` in every component of every vector
    struct ConstantModel {
        info: ModelInfo,
        value: f32,
    }

    #[async_trait]
    impl EmbeddingModel for ConstantModel {
        fn info(&self) -> &ModelInfo {
            &self.info
        }

        async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Embedding>> {
            Ok(texts.iter().map(|_| vec![self.value; self.info.dimension]).collect())
        }
    }

    #[tokio::test]
    async fn test_non_finite_values_rejected() {
        for value in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let service = EmbeddingService::new(Arc::new(ConstantModel { info: info(2), value }));
            let err = service.embed(&["x".to_string()]).await.unwrap_err();
            assert!(matches!(err, EmbeddingError::EmbeddingFailed { .. }));
            assert!(err.to_string().contains("non-finite"));
        }

        let service = EmbeddingService::new(Arc::new(ConstantModel { info: info(2), value: 0.5 }));
        assert_eq!(service.embed(&["x".to_string()]).await.unwrap(), vec![vec![0.5, 0.5]]);
    }
}
