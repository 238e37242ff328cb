//! Hyper-based HTTP server
//!
//! Hyper directly, no router framework: four routes matched by method and
//! path. The embedding service is handed in by the caller and shared by every
//! connection through `ServerState`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hyper::body::to_bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, ORIGIN};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use serde_json::error::Category;
use tokio::net::TcpSocket;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::EmbeddingService;
use crate::protocol::{EmbedRequest, EmbedResponse, HealthResponse, HttpErrorResponse, ServerInfo};
use crate::server::config::ServerConfig;

/// Shared state for every connection
#[derive(Clone)]
pub struct ServerState {
    service: Arc<EmbeddingService>,
    server_id: Uuid,
    log_request_timings: bool,
}

impl ServerState {
    pub fn new(service: Arc<EmbeddingService>) -> Self {
        Self {
            service,
            server_id: Uuid::new_v4(),
            log_request_timings: false,
        }
    }

    pub fn with_request_timings(mut self, enabled: bool) -> Self {
        self.log_request_timings = enabled;
        self
    }

    pub fn server_id(&self) -> Uuid {
        self.server_id
    }

    fn log_timing(&self, stage: &str, elapsed: Duration) {
        if self.log_request_timings {
            info!("⏱️  {} took: {:?}", stage, elapsed);
        } else {
            debug!("⏱️  {} took: {:?}", stage, elapsed);
        }
    }
}

/// Bind the configured address and serve until Ctrl-C / SIGTERM
pub async fn start_http_server(
    config: &ServerConfig,
    service: Arc<EmbeddingService>,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = config.bind_addr()?;

    info!("🚀 Starting HTTP embedding server");
    info!("📡 Binding to {}", addr);

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    // Small JSON responses; Nagle would hold them back
    socket.set_nodelay(true)?;
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    let listener = socket.listen(config.network.backlog)?;

    let state = ServerState::new(service).with_request_timings(config.monitoring.log_request_timings);
    info!("🆔 Server ID: {}", state.server_id());
    info!("📍 Endpoints:");
    info!("   POST /embed      - Embed a batch of texts");
    info!("   GET  /health     - Health check");
    info!("   GET  /           - Server info");

    serve(
        listener.into_std()?,
        state,
        config.network.http1_keepalive,
        shutdown_signal(),
    )
    .await?;

    info!("👋 Server stopped");
    Ok(())
}

/// Serve HTTP on an already-bound listener until `shutdown` resolves
pub async fn serve<F>(
    listener: std::net::TcpListener,
    state: ServerState,
    keepalive: bool,
    shutdown: F,
) -> Result<(), hyper::Error>
where
    F: Future<Output = ()>,
{
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let state = state.clone();
                handle_request(req, state)
            }))
        }
    });

    let server = Server::from_tcp(listener)?
        .http1_keepalive(keepalive)
        .http1_half_close(false)
        .tcp_nodelay(true)
        .tcp_sleep_on_accept_errors(true)
        .serve(make_svc);

    info!("✅ HTTP server listening on {}", server.local_addr());

    server.with_graceful_shutdown(shutdown).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("🛑 Shutdown signal received, draining connections");
}

/// Route a request and attach CORS headers
pub async fn handle_request(
    req: Request<Body>,
    state: ServerState,
) -> Result<Response<Body>, Infallible> {
    let origin = req
        .headers()
        .get(ORIGIN)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = match (&method, path.as_str()) {
        (&Method::POST, "/embed") => handle_embed(req, &state).await,
        (&Method::GET, "/health") => handle_health(&state),
        (&Method::GET, "/") => handle_root(&state),
        (&Method::OPTIONS, _) => handle_options(),
        _ => json_response(StatusCode::NOT_FOUND, &HttpErrorResponse::not_found()),
    };

    let headers = response.headers_mut();
    headers.insert("access-control-allow-origin", origin);
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );

    Ok(response)
}

/// OPTIONS handler for CORS preflight
fn handle_options() -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

fn handle_root(state: &ServerState) -> Response<Body> {
    let info = state.service.model_info();
    let body = ServerInfo::new(state.server_id.to_string(), info.name.clone(), info.dimension);
    json_response(StatusCode::OK, &body)
}

/// Health check; reports the loaded model without running it
fn handle_health(state: &ServerState) -> Response<Body> {
    debug!("🏥 Health check requested");
    let info = state.service.model_info();
    json_response(StatusCode::OK, &HealthResponse::healthy(info.name.clone(), info.dimension))
}

async fn handle_embed(req: Request<Body>, state: &ServerState) -> Response<Body> {
    let start_time = Instant::now();
    let request_id = Uuid::new_v4();

    let body_bytes = match to_bytes(req.into_body()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("[{}] Failed to read request body: {}", request_id, e);
            return json_response(
                StatusCode::BAD_REQUEST,
                &HttpErrorResponse::invalid_json(format!("Failed to read request body: {}", e)),
            );
        }
    };

    let request: EmbedRequest = match serde_json::from_slice(&body_bytes) {
        Ok(req) => req,
        Err(e) => {
            debug!("[{}] Rejected request body: {}", request_id, e);
            return match e.classify() {
                Category::Data => json_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    &HttpErrorResponse::validation_error(e.to_string()),
                ),
                Category::Io | Category::Syntax | Category::Eof => json_response(
                    StatusCode::BAD_REQUEST,
                    &HttpErrorResponse::invalid_json(e.to_string()),
                ),
            };
        }
    };

    debug!("[{}] 🔤 Embedding {} inputs", request_id, request.inputs.len());

    let embed_start = Instant::now();
    let result = state.service.embed(&request.inputs).await;
    state.log_timing("Embedding generation", embed_start.elapsed());

    match result {
        Ok(embeddings) => {
            let response = json_response(StatusCode::OK, &EmbedResponse::new(embeddings));
            state.log_timing("Total request", start_time.elapsed());
            response
        }
        Err(e) => {
            error!("[{}] ❌ Embedding generation failed: {}", request_id, e);
            json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &HttpErrorResponse::internal_error(e.to_string()),
            )
        }
    }
}

/// Serialize `body` as a JSON response; a serialization failure becomes a bare 500
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status;
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Err(e) => {
            error!("❌ Failed to serialize response body: {}", e);
            let mut response = Response::new(Body::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    }
}
