//! HTTP front end and query interface
//!
//! Agents that cannot keep a TCP connection open post one form-encoded report
//! per request; dashboards read the most recent state of the fleet.
//!
//! ## Endpoints
//!
//! - `POST /api/v1/reports` - Ingest one report (form body)
//! - `GET /api/v1/reports/latest` - Most recent report of every host
//! - `GET /api/v1/hosts` - Known hosts
//! - `GET /api/v1/hosts/{host}/latest` - Most recent report of one host
//! - `GET /api/v1/summary` - Fleet totals (hosts, cores, memory)
//! - `GET /api/v1/health` - Health check

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{HealthResponse, HostsResponse, IngestResponse, LatestReportsResponse, SummaryResponse};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

#[cfg(feature = "api")]
pub fn router(state: ApiState) -> Router {
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/hosts", get(routes::hosts::list_hosts))
        .route("/api/v1/hosts/:host/latest", get(routes::hosts::latest_report))
        .route("/api/v1/reports", post(routes::reports::submit_report))
        .route("/api/v1/reports/latest", get(routes::reports::latest_reports))
        .route("/api/v1/summary", get(routes::reports::fleet_summary))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Spawn the API server
///
/// This starts an Axum HTTP server in a background task.
/// Returns the server's local address.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
