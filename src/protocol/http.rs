//! HTTP error, health and info bodies

use serde::{Deserialize, Serialize};

/// HTTP Error Response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error message
    pub error: String,

    /// Error code (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Additional details (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HttpErrorResponse {
    /// Create a new error response
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            details: None,
        }
    }

    /// Create error with code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Create error with details
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Body could not be read or is not JSON
    pub fn invalid_json(details: impl Into<String>) -> Self {
        Self::new("Request body is not valid JSON")
            .with_code("INVALID_JSON")
            .with_details(details)
    }

    /// JSON parsed but does not match `{"inputs": [string, ...]}`
    pub fn validation_error(details: impl Into<String>) -> Self {
        Self::new("Request body must be an object with an 'inputs' list of strings")
            .with_code("VALIDATION_ERROR")
            .with_details(details)
    }

    pub fn not_found() -> Self {
        Self::new("Not Found").with_code("NOT_FOUND")
    }

    /// Create internal error
    pub fn internal_error(details: impl Into<String>) -> Self {
        Self::new("Internal server error occurred during embedding generation")
            .with_code("INTERNAL_ERROR")
            .with_details(details)
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub version: String,
    pub embedding_dimension: usize,
}

impl HealthResponse {
    pub fn healthy(model: impl Into<String>, dimension: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            model: model.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            embedding_dimension: dimension,
        }
    }
}

/// Root endpoint body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    pub server_id: String,
    pub model: String,
    pub embedding_dimension: usize,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub method: String,
    pub path: String,
    pub description: String,
}

impl EndpointInfo {
    fn new(method: &str, path: &str, description: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
        }
    }
}

impl ServerInfo {
    pub fn new(server_id: impl Into<String>, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: "Embedding Server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            server_id: server_id.into(),
            model: model.into(),
            embedding_dimension: dimension,
            endpoints: vec![
                EndpointInfo::new("POST", "/embed", "Embed a batch of texts"),
                EndpointInfo::new("GET", "/health", "Health check"),
                EndpointInfo::new("GET", "/", "Server info"),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = HttpErrorResponse::new("Test error")
            .with_code("TEST_ERROR")
            .with_details("Additional details");

        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, Some("TEST_ERROR".to_string()));
        assert_eq!(err.details, Some("Additional details".to_string()));
    }

    #[test]
    fn test_optional_fields_skipped() {
        let json = serde_json::to_string(&HttpErrorResponse::not_found()).unwrap();
        assert_eq!(json, r#"{"error":"Not Found","code":"NOT_FOUND"}"#);
    }

    #[test]
    fn test_server_info_lists_embed() {
        let info = ServerInfo::new("id", "model", 768);
        assert!(info.endpoints.iter().any(|e| e.method == "POST" && e.path == "/embed"));
    }
}
