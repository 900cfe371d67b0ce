//! HTTP server exposing notification adapters over MCP.
//!
//! This crate wires the email, calendar, and to-do adapters into an HTTP
//! server speaking the MCP (Model Context Protocol) JSON-RPC dialect:
//!
//! - `POST /mcp` -- the MCP endpoint (single requests and batches).
//! - `GET /api/status` -- process status and adapter health.
//! - `GET /api/tools` -- flat list of every exposed tool.

pub mod api;
pub mod mcp;
pub mod server;
pub mod state;

pub use mcp::McpServer;
pub use server::HttpServer;
pub use state::AppState;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".into(),
            port: 8000,
        }
    }
}
