//! In-memory storage backend (no persistence)
//!
//! Useful for:
//! - Testing without database dependencies
//! - Running the hub without a database (`dbBackend memory`)
//!
//! ## Limitations
//!
//! - **No persistence**: All data lost on restart
//! - **Unbounded**: Every report is kept for the lifetime of the process

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::backend::{HealthStatus, HostRegistry, ReportStore, StorageBackend};
use super::error::StorageResult;
use crate::report::Report;

/// In-memory storage backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    /// Known hosts, kept sorted
    hosts: RwLock<BTreeSet<String>>,

    /// Reports per host, keyed by timestamp
    reports: RwLock<HashMap<String, BTreeMap<i64, Report>>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored reports across all hosts
    pub async fn report_count(&self) -> usize {
        self.reports.read().await.values().map(BTreeMap::len).sum()
    }
}

#[async_trait]
impl ReportStore for MemoryBackend {
    async fn append(&self, report: &Report) -> StorageResult<()> {
        debug!("storing report {} for {}", report.timestamp, report.hostname);

        self.reports
            .write()
            .await
            .entry(report.hostname.clone())
            .or_default()
            .insert(report.timestamp, report.clone());

        Ok(())
    }

    async fn latest(&self, hostname: &str, limit: usize) -> StorageResult<Vec<Report>> {
        let reports = self
            .reports
            .read()
            .await
            .get(hostname)
            .map(|history| history.values().rev().take(limit).cloned().collect())
            .unwrap_or_default();

        Ok(reports)
    }

    async fn latest_for_all_hosts(&self) -> StorageResult<Vec<Report>> {
        let reports = self.reports.read().await;

        let mut latest: Vec<Report> = reports
            .values()
            .filter_map(|history| history.values().next_back().cloned())
            .collect();
        latest.sort_by(|a, b| a.hostname.cmp(&b.hostname));

        Ok(latest)
    }
}

#[async_trait]
impl HostRegistry for MemoryBackend {
    async fn ensure(&self, hostname: &str) -> StorageResult<bool> {
        Ok(self.hosts.write().await.insert(hostname.to_string()))
    }

    async fn list_all(&self) -> StorageResult<Vec<String>> {
        Ok(self.hosts.read().await.iter().cloned().collect())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            message: "In-memory storage operational".to_string(),
            metadata: HashMap::from([
                ("backend".to_string(), "memory".to_string()),
                ("hosts".to_string(), self.hosts.read().await.len().to_string()),
                ("reports".to_string(), self.report_count().await.to_string()),
            ]),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        debug!("closing in-memory backend (no-op)");
        Ok(())
    }
}
