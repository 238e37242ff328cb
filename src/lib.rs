//! Embedding Server Library
//!
//! HTTP service that turns a batch of strings into sentence embeddings with a
//! pretrained ONNX model.

pub mod models;
pub mod onnx;
pub mod protocol;
pub mod server;

// Re-exports
pub use models::{Embedding, EmbeddingError, EmbeddingModel, EmbeddingResult, EmbeddingService, ModelInfo};
pub use protocol::{EmbedRequest, EmbedResponse};
pub use server::{start_http_server, ServerConfig, ServerState};
