//! REST API route handlers.
//!
//! Small operational surface next to the MCP endpoint: process status with
//! per-adapter health, and a flat tool listing for quick inspection.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::{Value, json};

use crate::state::AppState;

/// Response payload for `GET /api/status`.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub adapters: Vec<AdapterStatus>,
}

/// Health summary for one adapter.
#[derive(Serialize)]
pub struct AdapterStatus {
    pub id: String,
    pub adapter_type: String,
    pub health: String,
    pub tool_count: usize,
}

/// Return process status and per-adapter health.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let uptime = SystemTime::now()
        .duration_since(state.started_at)
        .unwrap_or(Duration::ZERO)
        .as_secs();

    let mut adapters = Vec::with_capacity(state.adapters.len());
    let mut all_healthy = true;
    for adapter in &state.adapters {
        let health = match adapter.health_check().await {
            Ok(h) => h.to_string(),
            Err(e) => {
                tracing::warn!(id = %adapter.id(), error = %e, "adapter health check failed");
                "unhealthy".to_string()
            }
        };
        if health != "healthy" {
            all_healthy = false;
        }
        adapters.push(AdapterStatus {
            id: adapter.id().to_string(),
            adapter_type: adapter.adapter_type().to_string(),
            health,
            tool_count: adapter.tools().len(),
        });
    }

    Json(StatusResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: uptime,
        adapters,
    })
}

/// Return every tool exposed by every adapter.
pub async fn tools(State(state): State<Arc<AppState>>) -> Json<Value> {
    let tools: Vec<Value> = state
        .adapters
        .iter()
        .flat_map(|adapter| {
            let adapter_id = adapter.id().to_string();
            adapter.tools().into_iter().map(move |t| {
                json!({
                    "adapter": adapter_id,
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                })
            })
        })
        .collect();

    Json(json!({ "count": tools.len(), "tools": tools }))
}
