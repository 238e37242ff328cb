//! Server module

pub mod config;
pub mod hyper_server;

pub use config::ServerConfig;
pub use hyper_server::{handle_request, serve, start_http_server, ServerState};
