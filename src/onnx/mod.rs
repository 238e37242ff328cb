//! ONNX Runtime inference for sentence embeddings

pub mod onnx_engine;

pub use onnx_engine::{embed_in_chunks, l2_normalize, mean_pooling, OnnxConfig};
#[cfg(feature = "onnx")]
pub use onnx_engine::OnnxEmbeddingEngine;
