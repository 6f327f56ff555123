//! Health check endpoint

use axum::{Json, extract::State};
use chrono::Utc;

use crate::api::{error::ApiResult, state::ApiState, types::HealthResponse};

/// GET /api/v1/health
///
/// Reports `degraded` while the store is unhealthy. Always answers 200 so a
/// dashboard can show why.
pub async fn health_check(State(state): State<ApiState>) -> ApiResult<Json<HealthResponse>> {
    let storage = state.pipeline.store().health_check().await?;
    let now = Utc::now();

    Ok(Json(HealthResponse {
        status: if storage.healthy { "ok" } else { "degraded" }.to_string(),
        timestamp: now.to_rfc3339(),
        uptime_secs: (now - state.started_at).num_seconds(),
        storage,
        notifications: state.pipeline.dispatcher().stats(),
    }))
}
