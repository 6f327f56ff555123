//! Row layout shared by the SQL backends
//!
//! ## Tables
//!
//! - `hosts (host PRIMARY KEY)`
//! - `reports (hostname, timestamp, ...)` with primary key `(hostname, timestamp)`
//!
//! Integers are stored as signed 64-bit columns and the disk report in its
//! wire form (`/ 50 /home 30`), so a row can be read back by any SQL client.

use sqlx::FromRow;

use super::error::StorageError;
use crate::{codec::parse_disk_report, report::Report};

/// Columns selected by every report query, in table order
pub const REPORT_COLUMNS: &str = "hostname, timestamp, num_cpus, mem_total_kb, load_one, \
     load_five, load_fifteen, swap_used_pct, kernel_version, os_release, uptime, disk_report";

/// A row of the `reports` table
#[derive(Debug, Clone, FromRow)]
pub struct ReportRow {
    pub hostname: String,
    pub timestamp: i64,
    pub num_cpus: i64,
    pub mem_total_kb: i64,
    pub load_one: f64,
    pub load_five: f64,
    pub load_fifteen: f64,
    pub swap_used_pct: f64,
    pub kernel_version: String,
    pub os_release: String,
    pub uptime: String,
    pub disk_report: String,
}

impl ReportRow {
    /// Fails if a value does not fit its column, so the row is never written
    pub fn from_report(report: &Report) -> Result<Self, StorageError> {
        let mem_total_kb = i64::try_from(report.mem_total_kb).map_err(|_| {
            StorageError::SerializationError(format!("invalid mem_total_kb {}", report.mem_total_kb))
        })?;

        Ok(Self {
            hostname: report.hostname.clone(),
            timestamp: report.timestamp,
            num_cpus: i64::from(report.num_cpus),
            mem_total_kb,
            load_one: report.load_one,
            load_five: report.load_five,
            load_fifteen: report.load_fifteen,
            swap_used_pct: report.swap_used_pct,
            kernel_version: report.kernel_version.clone(),
            os_release: report.os_release.clone(),
            uptime: report.uptime.clone(),
            disk_report: report.disk_report_string(),
        })
    }
}

impl TryFrom<ReportRow> for Report {
    type Error = StorageError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        let num_cpus = u32::try_from(row.num_cpus).map_err(|_| {
            StorageError::SerializationError(format!("invalid num_cpus {}", row.num_cpus))
        })?;
        let mem_total_kb = u64::try_from(row.mem_total_kb).map_err(|_| {
            StorageError::SerializationError(format!("invalid mem_total_kb {}", row.mem_total_kb))
        })?;
        let disk_report = parse_disk_report(&row.disk_report).map_err(|e| {
            StorageError::SerializationError(format!("invalid disk report: {e}"))
        })?;

        Ok(Report {
            timestamp: row.timestamp,
            hostname: row.hostname,
            num_cpus,
            mem_total_kb,
            load_one: row.load_one,
            load_five: row.load_five,
            load_fifteen: row.load_fifteen,
            swap_used_pct: row.swap_used_pct,
            kernel_version: row.kernel_version,
            os_release: row.os_release,
            uptime: row.uptime,
            disk_report,
        })
    }
}

/// Convert fetched rows into reports, failing on the first bad row
pub fn rows_to_reports(rows: Vec<ReportRow>) -> Result<Vec<Report>, StorageError> {
    rows.into_iter().map(Report::try_from).collect()
}
