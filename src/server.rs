//! HTTP server for receiving observation windows from wearable devices.
//!
//! This module provides an HTTP server that:
//! - Accepts IMU/PPG sample batches via POST /api/threat/ingest
//! - Validates each batch and rejects it wholesale on any field error
//! - Persists the window and its samples atomically through the store
//!
//! # Architecture
//!
//! ```text
//! Wearable ──→ POST /api/threat/ingest ──→ validate ──→ store (one tx)
//!                                              │
//!                                       400 field errors
//! ```

use crate::ingest::{self, ValidationErrors};
use crate::store::Store;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Path to the SQLite database file
    pub db_path: PathBuf,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, db_path: PathBuf) -> Self {
        Self { port, db_path }
    }
}

/// Shared server state
pub struct ServerState {
    /// Window/sample store. Each request runs its own transaction.
    store: Mutex<Store>,
}

impl ServerState {
    /// Create new server state, opening the store at the configured path.
    pub fn new(config: &ServerConfig) -> anyhow::Result<Self> {
        let store = Store::open(&config.db_path)?;
        Ok(Self {
            store: Mutex::new(store),
        })
    }
}

/// Response from the ingest endpoint
#[derive(Debug, Clone, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub window_id: i64,
    pub saved_samples: usize,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/threat/ingest
///
/// Accepts one observation window as a JSON batch. Validation failures
/// return 400 with a field-keyed error map and persist nothing; storage
/// failures roll back the whole batch and return 500.
async fn ingest(
    State(state): State<Arc<ServerState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<IngestResponse>), (StatusCode, Json<serde_json::Value>)> {
    let request = ingest::validate(&body).map_err(|errors: ValidationErrors| {
        tracing::debug!("Rejected ingest request: {:?}", errors);
        (StatusCode::BAD_REQUEST, Json(json!(errors)))
    })?;

    let saved_samples = request.samples.len();
    let window_id = {
        let mut store = state.store.lock().await;
        store.create_window(&request).map_err(|e| {
            tracing::error!("Failed to persist window: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to persist window",
                    "code": "STORAGE_ERROR",
                })),
            )
        })?
    };

    tracing::info!(
        "Stored window {} ({} samples) from device {}",
        window_id,
        saved_samples,
        request.device_id
    );

    Ok((
        StatusCode::CREATED,
        Json(IngestResponse {
            ok: true,
            window_id,
            saved_samples,
        }),
    ))
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config)?);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/threat/ingest", post(ingest))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Threat ingest server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
