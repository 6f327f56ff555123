//! Storage traits
//!
//! The hub needs two things from persistence: the per-host report history
//! ([`ReportStore`]) and the set of known hosts ([`HostRegistry`]). Every
//! backend implements both, bundled as [`StorageBackend`].

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::StorageResult;
use crate::report::Report;

/// Health status of the storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Is the backend operational?
    pub healthy: bool,

    /// Human-readable status message
    pub message: String,

    /// Additional backend-specific metadata
    pub metadata: HashMap<String, String>,
}

/// Append-only report history, keyed by `(hostname, timestamp)`
///
/// ## Ordering
///
/// Reads always order by the report timestamp, never by insertion order, so
/// reports that arrive out of order are sorted out on read.
///
/// ## Concurrency
///
/// `previous` followed by `append` is not atomic. Two reports for the same host
/// arriving on different connections may both observe the same previous report.
#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Record a report. A report with the same `(hostname, timestamp)` replaces the stored one.
    async fn append(&self, report: &Report) -> StorageResult<()>;

    /// Up to `limit` most recent reports for a host, newest first
    async fn latest(&self, hostname: &str, limit: usize) -> StorageResult<Vec<Report>>;

    /// The most recent report of every host that has one, ordered by hostname
    async fn latest_for_all_hosts(&self) -> StorageResult<Vec<Report>>;

    /// Most recent stored report for a host
    ///
    /// Called before the incoming report is appended, so this is the report
    /// the incoming one is compared against.
    async fn previous(&self, hostname: &str) -> StorageResult<Option<Report>> {
        Ok(self.latest(hostname, 1).await?.into_iter().next())
    }
}

/// The set of hosts that have ever reported
#[async_trait]
pub trait HostRegistry: Send + Sync {
    /// Register a host if unseen. Returns `true` if a new record was created.
    ///
    /// Concurrent calls for the same new hostname create exactly one record.
    async fn ensure(&self, hostname: &str) -> StorageResult<bool>;

    /// All known hostnames in lexicographic order
    async fn list_all(&self) -> StorageResult<Vec<String>>;
}

/// A complete persistence backend
#[async_trait]
pub trait StorageBackend: ReportStore + HostRegistry {
    /// Check backend health
    ///
    /// Performs a lightweight operation to verify the backend
    /// is operational (e.g., ping database, check file access).
    async fn health_check(&self) -> StorageResult<HealthStatus>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
