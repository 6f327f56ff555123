//! Host endpoints

use axum::{
    Json,
    extract::{Path, State},
};

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::HostsResponse,
    },
    report::Report,
};

/// GET /api/v1/hosts
///
/// Every host that ever reported, in lexicographic order
pub async fn list_hosts(State(state): State<ApiState>) -> ApiResult<Json<HostsResponse>> {
    let hosts = state.pipeline.store().list_all().await?;

    Ok(Json(HostsResponse {
        count: hosts.len(),
        hosts,
    }))
}

/// GET /api/v1/hosts/:host/latest
pub async fn latest_report(
    State(state): State<ApiState>,
    Path(host): Path<String>,
) -> ApiResult<Json<Report>> {
    state
        .pipeline
        .store()
        .previous(&host)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no reports for host {host}")))
}
