//! HTTP server setup and startup.
//!
//! [`HttpServer`] composes the Axum router, registers the MCP and REST
//! routes, and runs the listener until shutdown.

use std::sync::Arc;
use std::time::SystemTime;

use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use notifier_adapters::Adapter;

use crate::ServerConfig;
use crate::api;
use crate::mcp;
use crate::state::AppState;

/// The notifier HTTP server.
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Create a new server exposing the given adapters.
    pub fn new(config: ServerConfig, adapters: Vec<Arc<dyn Adapter>>) -> Self {
        let state = Arc::new(AppState {
            adapters,
            config: config.clone(),
            started_at: SystemTime::now(),
        });
        Self { config, state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.bind_addr, self.config.port)
    }

    /// Build the Axum router with all routes registered.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin("*".parse::<HeaderValue>().expect("static header value"))
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            .route("/mcp", post(mcp::handle_mcp_request))
            .route("/api/status", get(api::status))
            .route("/api/tools", get(api::tools))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting MCP server");

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
