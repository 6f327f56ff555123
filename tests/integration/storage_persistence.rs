//! Integration tests for storage persistence
//!
//! These tests verify that:
//! - Reports and hosts survive reopening the SQLite database
//! - Reads order by timestamp regardless of arrival order
//! - A replayed report replaces the stored one
//! - The configured backend is selected by `storage::open`

use hostmon::{
    config::{DatabaseConfig, DbBackend},
    report::{DiskUsage, Mount, Report},
    storage::{self, HostRegistry, ReportStore, StorageBackend, sqlite::SqliteBackend},
};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn report(hostname: &str, timestamp: i64, load_one: f64) -> Report {
    Report {
        timestamp,
        hostname: hostname.to_string(),
        num_cpus: 8,
        mem_total_kb: 16_000_000,
        load_one,
        load_five: 0.5,
        load_fifteen: 0.25,
        swap_used_pct: 12.5,
        kernel_version: "6.1.0-18-amd64".to_string(),
        os_release: "Debian 12".to_string(),
        uptime: "86400".to_string(),
        disk_report: vec![
            DiskUsage::new(Mount::Root, 50),
            DiskUsage::new(Mount::Home, 30),
        ],
    }
}

#[tokio::test]
async fn test_reports_survive_reopen() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("hostmon.db");

    {
        let backend = SqliteBackend::new(&db_path).await.unwrap();
        backend.ensure("web01").await.unwrap();
        backend.append(&report("web01", 1000, 0.5)).await.unwrap();
        backend.append(&report("web01", 1060, 4.2)).await.unwrap();
        backend.close().await.unwrap();
    }

    let backend = SqliteBackend::new(&db_path).await.unwrap();

    assert_eq!(backend.list_all().await.unwrap(), vec!["web01"]);
    assert!(!backend.ensure("web01").await.unwrap());

    let previous = backend.previous("web01").await.unwrap().unwrap();
    assert_eq!(previous, report("web01", 1060, 4.2));
}

#[tokio::test]
async fn test_out_of_order_arrival_sorted_on_read() {
    let temp_dir = tempdir().unwrap();
    let backend = SqliteBackend::new(temp_dir.path().join("hostmon.db"))
        .await
        .unwrap();

    for timestamp in [1060, 1000, 1120, 1030] {
        backend.append(&report("web01", timestamp, 1.0)).await.unwrap();
    }

    let timestamps: Vec<i64> = backend
        .latest("web01", 3)
        .await
        .unwrap()
        .iter()
        .map(|r| r.timestamp)
        .collect();

    assert_eq!(timestamps, vec![1120, 1060, 1030]);
}

#[tokio::test]
async fn test_replayed_report_replaces_stored_one() {
    let temp_dir = tempdir().unwrap();
    let backend = SqliteBackend::new(temp_dir.path().join("hostmon.db"))
        .await
        .unwrap();

    backend.append(&report("web01", 1000, 0.5)).await.unwrap();
    backend.append(&report("web01", 1000, 7.5)).await.unwrap();

    let stored = backend.latest("web01", 10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].load_one, 7.5);
}

#[tokio::test]
async fn test_unstorable_report_leaves_history_readable() {
    let temp_dir = tempdir().unwrap();
    let backend = SqliteBackend::new(temp_dir.path().join("hostmon.db"))
        .await
        .unwrap();

    backend.append(&report("web01", 1000, 0.5)).await.unwrap();

    let mut oversized = report("web01", 1060, 0.5);
    oversized.mem_total_kb = u64::MAX;
    assert!(backend.append(&oversized).await.is_err());

    assert_eq!(
        backend.previous("web01").await.unwrap().unwrap().timestamp,
        1000
    );
    backend.append(&report("web01", 1120, 0.5)).await.unwrap();
    assert_eq!(backend.latest_for_all_hosts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_latest_for_all_hosts() {
    let temp_dir = tempdir().unwrap();
    let backend = SqliteBackend::new(temp_dir.path().join("hostmon.db"))
        .await
        .unwrap();

    for (host, timestamp) in [("web02", 1000), ("db01", 1000), ("web02", 1060), ("db01", 990)] {
        backend.ensure(host).await.unwrap();
        backend.append(&report(host, timestamp, 1.0)).await.unwrap();
    }

    let latest: Vec<(String, i64)> = backend
        .latest_for_all_hosts()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.hostname, r.timestamp))
        .collect();

    assert_eq!(
        latest,
        vec![("db01".to_string(), 1000), ("web02".to_string(), 1060)]
    );
}

#[tokio::test]
async fn test_open_selects_backend() {
    let temp_dir = tempdir().unwrap();
    let db_path = temp_dir.path().join("hostmon.db");

    let config = DatabaseConfig {
        backend: DbBackend::Sqlite,
        name: db_path.to_string_lossy().to_string(),
        ..DatabaseConfig::memory()
    };
    let backend = storage::open(&config).await.unwrap();
    let health = backend.health_check().await.unwrap();
    assert!(health.healthy);
    assert_eq!(health.metadata.get("backend").unwrap(), "sqlite");

    let backend = storage::open(&DatabaseConfig::memory()).await.unwrap();
    let health = backend.health_check().await.unwrap();
    assert_eq!(health.metadata.get("backend").unwrap(), "memory");
}
