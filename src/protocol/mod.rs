//! Wire types for the embedding endpoint
//!
//! JSON in, JSON out:
//! - Request:  `{"inputs": ["text", ...]}`
//! - Response: `{"embeddings": [[0.1, 0.2, ...], ...]}`

pub mod http;

use serde::{Deserialize, Deserializer, Serialize};

use crate::models::Embedding;

pub use self::http::{HealthResponse, HttpErrorResponse, ServerInfo};

/// Embedding request
///
/// `inputs` must be present; an explicit `null` counts as an empty batch.
/// Unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedRequest {
    /// Texts to embed, in order
    #[serde(deserialize_with = "nullable_inputs")]
    pub inputs: Vec<String>,
}

fn nullable_inputs<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl EmbedRequest {
    pub fn new(inputs: Vec<String>) -> Self {
        Self { inputs }
    }
}

/// Embedding response, one vector per request input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub embeddings: Vec<Embedding>,
}

impl EmbedResponse {
    pub fn new(embeddings: Vec<Embedding>) -> Self {
        Self { embeddings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parsing() {
        let req: EmbedRequest = serde_json::from_str(r#"{"inputs": ["a", "b"]}"#).unwrap();
        assert_eq!(req.inputs, vec!["a".to_string(), "b".to_string()]);

        let req: EmbedRequest = serde_json::from_str(r#"{"inputs": []}"#).unwrap();
        assert!(req.inputs.is_empty());

        let req: EmbedRequest = serde_json::from_str(r#"{"inputs": ["a"], "model": "x"}"#).unwrap();
        assert_eq!(req.inputs.len(), 1);
    }

    #[test]
    fn test_null_inputs_is_empty() {
        let req: EmbedRequest = serde_json::from_str(r#"{"inputs": null}"#).unwrap();
        assert!(req.inputs.is_empty());
    }

    #[test]
    fn test_malformed_requests_rejected() {
        assert!(serde_json::from_str::<EmbedRequest>(r#"{}"#).is_err());
        assert!(serde_json::from_str::<EmbedRequest>(r#"{"inputs": "not-a-list"}"#).is_err());
        assert!(serde_json::from_str::<EmbedRequest>(r#"{"inputs": [1, 2]}"#).is_err());
        assert!(serde_json::from_str::<EmbedRequest>(r#"["a"]"#).is_err());
    }

    #[test]
    fn test_response_shape() {
        let response = EmbedResponse::new(vec![vec![0.5, -0.25], vec![1.0, 0.0]]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json, serde_json::json!({"embeddings": [[0.5, -0.25], [1.0, 0.0]]}));

        let empty = serde_json::to_string(&EmbedResponse::new(Vec::new())).unwrap();
        assert_eq!(empty, r#"{"embeddings":[]}"#);
    }
}
