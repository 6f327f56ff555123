//! API response types

use serde::{Deserialize, Serialize};

use crate::notify::{Delivery, DeliveryStats};
use crate::report::{FleetSummary, Report};
use crate::storage::HealthStatus;

/// Response for GET /api/v1/health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`
    pub status: String,
    pub timestamp: String,
    pub uptime_secs: i64,
    pub storage: HealthStatus,
    pub notifications: DeliveryStats,
}

/// Response for GET /api/v1/hosts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsResponse {
    pub hosts: Vec<String>,
    pub count: usize,
}

/// Response for GET /api/v1/reports/latest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestReportsResponse {
    pub reports: Vec<Report>,
    pub count: usize,
}

/// Response for GET /api/v1/summary
pub type SummaryResponse = FleetSummary;

/// Response for POST /api/v1/reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub hostname: String,
    pub new_host: bool,

    /// Number of alerts the report raised
    pub alerts: usize,
    pub deliveries: Vec<Delivery>,
}
