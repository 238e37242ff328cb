//! Embedding Server Main
//!
//! Loads the model once, then serves `POST /embed` until shutdown.

use std::path::Path;
use std::sync::Arc;

use embed_server::{start_http_server, EmbeddingModel, EmbeddingService, ServerConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = ServerConfig::config_path(|key| std::env::var(key).ok());
    let config = ServerConfig::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter().into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();

    info!("🚀 Embedding Server v{}", env!("CARGO_PKG_VERSION"));
    if Path::new(&config_path).exists() {
        info!("📄 Configuration loaded from {}", config_path);
    } else {
        info!("📄 No config file at {}, using defaults", config_path);
    }
    info!("📦 Model: {}", config.model.name);
    info!("📊 Log Level: {}", config.monitoring.log_level);

    let model = match load_model(&config).await {
        Ok(model) => model,
        Err(e) => {
            error!("❌ Failed to load model '{}': {}", config.model.name, e);
            error!("   Model: {}", config.model.model_path);
            error!("   Tokenizer: {}", config.model.tokenizer_path);
            return Err(e);
        }
    };

    let service = Arc::new(EmbeddingService::new(model));
    info!("✅ Embedding model loaded ({} dimensions)", service.dimension());

    start_http_server(&config, service).await
}

#[cfg(feature = "onnx")]
async fn load_model(config: &ServerConfig) -> Result<Arc<dyn EmbeddingModel>, Box<dyn std::error::Error>> {
    let model = embed_server::models::model::onnx::OnnxEmbeddingModel::load(config.model.clone()).await?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
async fn load_model(_config: &ServerConfig) -> Result<Arc<dyn EmbeddingModel>, Box<dyn std::error::Error>> {
    Err("embed_server was built without the `onnx` feature; no model backend available".into())
}
