//! HTTP and WebSocket gateway for Vigil investigations.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/v1/investigations` - Run an investigation to completion
//! - `WS /api/v1/ws` - Stream investigation events as they happen
//!
//! # WebSocket protocol
//!
//! The client sends `{"type": "investigate", "prompt": .., "indicator": .., "logs": ..}`
//! and receives `investigation_started`, one event per iteration, then a
//! terminal `finished`, `halted` or `error` event (`aborted` if the run dies
//! without one). `{"type": "cancel"}` stops
//! the run before its next iteration.
//!
//! # Architecture
//!
//! ```text
//! Client (browser/SOC tooling)
//!    │
//!    ▼
//! ┌─────────────────┐
//! │   API Gateway   │ ◄── This crate
//! │     (Axum)      │
//! └────────┬────────┘
//!          │ mpsc events
//!          ▼
//! ┌─────────────────┐
//! │  Orchestrator   │
//! └─────────────────┘
//! ```

pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

pub use state::AppState;

/// Create the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/investigations", post(routes::investigate))
        .route("/api/v1/ws", get(routes::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the API server on the given address.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> anyhow::Result<()> {
    let router = create_router(state);

    info!(%addr, "Starting Vigil API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
