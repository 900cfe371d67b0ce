//! Shared application state for the HTTP server.

use std::sync::Arc;
use std::time::SystemTime;

use notifier_adapters::Adapter;

use crate::ServerConfig;

/// Shared state accessible from every Axum handler.
#[derive(Clone)]
pub struct AppState {
    /// Registered notification adapters (email, calendar, to-do).
    pub adapters: Vec<Arc<dyn Adapter>>,

    /// Server configuration.
    pub config: ServerConfig,

    /// Process start time, for uptime reporting.
    pub started_at: SystemTime,
}
