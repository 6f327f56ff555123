//! Report ingestion and fleet-wide queries

use axum::{Json, extract::State, http::StatusCode};
use tracing::{debug, instrument};

use crate::{
    api::{
        error::ApiResult,
        state::ApiState,
        types::{IngestResponse, LatestReportsResponse, SummaryResponse},
    },
    codec::Protocol,
    report::FleetSummary,
};

/// POST /api/v1/reports
///
/// Accepts one `application/x-www-form-urlencoded` report with the agent's
/// field names and runs it through the pipeline.
#[instrument(skip_all)]
pub async fn submit_report(
    State(state): State<ApiState>,
    body: String,
) -> ApiResult<(StatusCode, Json<IngestResponse>)> {
    let outcome = state.pipeline.ingest_raw(&body, Protocol::Form).await?;
    debug!("accepted report from {}", outcome.evaluation.hostname);

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            hostname: outcome.evaluation.hostname,
            new_host: outcome.new_host,
            alerts: outcome.evaluation.alerts.len(),
            deliveries: outcome.evaluation.deliveries,
        }),
    ))
}

/// GET /api/v1/reports/latest
///
/// Most recent report of every host, ordered by hostname
pub async fn latest_reports(State(state): State<ApiState>) -> ApiResult<Json<LatestReportsResponse>> {
    let reports = state.pipeline.store().latest_for_all_hosts().await?;

    Ok(Json(LatestReportsResponse {
        count: reports.len(),
        reports,
    }))
}

/// GET /api/v1/summary
pub async fn fleet_summary(State(state): State<ApiState>) -> ApiResult<Json<SummaryResponse>> {
    let reports = state.pipeline.store().latest_for_all_hosts().await?;
    Ok(Json(FleetSummary::from_reports(&reports)))
}
