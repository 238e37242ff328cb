//! Configuration for the embedding model
//!
//! Describes which pretrained model is loaded, where its ONNX graph and
//! tokenizer live, and how its output is pooled.

use serde::{Deserialize, Serialize};

/// Default model identity (sentence-transformers naming)
pub const DEFAULT_MODEL_NAME: &str = "sentence-transformers/all-mpnet-base-v2";

/// Configuration for the loaded model
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identity, reported by `/health` and `/`
    pub name: String,

    /// File paths
    pub model_path: String,
    pub tokenizer_path: String,

    /// Name of the graph output holding token embeddings
    pub output_name: String,

    /// Model parameters
    pub max_sequence_length: usize,
    pub embedding_dimension: usize,
    /// L2-normalize pooled embeddings
    pub normalize: bool,

    /// Texts per inference run; larger requests are split into chunks
    pub batch_size: usize,

    /// Intra-op threads for ONNX Runtime
    pub num_threads: usize,
    /// Path to the ONNX Runtime shared library, if not on the default search path
    pub onnx_runtime_path: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            model_path: "models/all-mpnet-base-v2/model.onnx".to_string(),
            tokenizer_path: "models/all-mpnet-base-v2/tokenizer.json".to_string(),
            output_name: "last_hidden_state".to_string(),
            max_sequence_length: 384,
            embedding_dimension: 768,
            normalize: true,
            batch_size: 32,
            num_threads: 4,
            onnx_runtime_path: None,
        }
    }
}

impl ModelConfig {
    /// Validate the model configuration
    pub fn validate(&self) -> Result<(), crate::models::EmbeddingError> {
        let config_error = |message: String| crate::models::EmbeddingError::ConfigError { message };

        if self.name.trim().is_empty() {
            return Err(config_error("Model name cannot be empty".to_string()));
        }
        if self.model_path.trim().is_empty() {
            return Err(config_error(format!("Model '{}' has no model_path", self.name)));
        }
        if self.tokenizer_path.trim().is_empty() {
            return Err(config_error(format!("Model '{}' has no tokenizer_path", self.name)));
        }
        if self.output_name.trim().is_empty() {
            return Err(config_error(format!("Model '{}' has no output_name", self.name)));
        }
        if self.embedding_dimension == 0 {
            return Err(config_error("embedding_dimension must be greater than 0".to_string()));
        }
        if self.max_sequence_length == 0 {
            return Err(config_error("max_sequence_length must be greater than 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(config_error("batch_size must be greater than 0".to_string()));
        }
        if self.num_threads == 0 {
            return Err(config_error("num_threads must be greater than 0".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.name, DEFAULT_MODEL_NAME);
        assert_eq!(config.embedding_dimension, 768);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ModelConfig = toml::from_str(
            r#"
            name = "sentence-transformers/all-MiniLM-L6-v2"
            embedding_dimension = 384
            "#,
        )
        .unwrap();

        assert_eq!(config.embedding_dimension, 384);
        assert_eq!(config.output_name, "last_hidden_state");
        assert!(config.normalize);
        assert_eq!(config.batch_size, 32);
        assert!(config.onnx_runtime_path.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ModelConfig::default();
        config.embedding_dimension = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.tokenizer_path = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.num_threads = 0;
        assert!(config.validate().is_err());

        let mut config = ModelConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
