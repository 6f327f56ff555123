//! SQLite storage backend implementation
//!
//! ## Features
//!
//! - **Embedded**: No separate database server required
//! - **WAL mode**: Better concurrency for reads during writes
//! - **Connection pooling**: Efficient resource usage
//! - **Migrations**: Automatic schema versioning with sqlx
//!
//! All statements are parameterized; no report value is ever spliced into SQL text.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, HostRegistry, ReportStore, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{REPORT_COLUMNS, ReportRow, rows_to_reports};
use crate::report::Report;

/// SQLite storage backend
pub struct SqliteBackend {
    pool: Pool<Sqlite>,
    db_path: String,
}

impl SqliteBackend {
    /// Create a new SQLite backend
    ///
    /// This will:
    /// 1. Create the database file if it doesn't exist
    /// 2. Run migrations to create tables
    /// 3. Configure SQLite for concurrent readers (WAL mode, etc.)
    #[instrument(skip_all)]
    pub async fn new(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        info!("initializing SQLite backend at: {}", db_path_str);

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30)); // Retry on lock contention

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations/sqlite").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }
}

#[async_trait]
impl ReportStore for SqliteBackend {
    #[instrument(skip(self, report), fields(hostname = %report.hostname, timestamp = report.timestamp))]
    async fn append(&self, report: &Report) -> StorageResult<()> {
        let row = ReportRow::from_report(report)?;

        sqlx::query(
            r#"
            INSERT INTO reports (
                hostname, timestamp, num_cpus, mem_total_kb, load_one, load_five,
                load_fifteen, swap_used_pct, kernel_version, os_release, uptime, disk_report
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (hostname, timestamp) DO UPDATE SET
                num_cpus = excluded.num_cpus,
                mem_total_kb = excluded.mem_total_kb,
                load_one = excluded.load_one,
                load_five = excluded.load_five,
                load_fifteen = excluded.load_fifteen,
                swap_used_pct = excluded.swap_used_pct,
                kernel_version = excluded.kernel_version,
                os_release = excluded.os_release,
                uptime = excluded.uptime,
                disk_report = excluded.disk_report
            "#,
        )
        .bind(&row.hostname)
        .bind(row.timestamp)
        .bind(row.num_cpus)
        .bind(row.mem_total_kb)
        .bind(row.load_one)
        .bind(row.load_five)
        .bind(row.load_fifteen)
        .bind(row.swap_used_pct)
        .bind(&row.kernel_version)
        .bind(&row.os_release)
        .bind(&row.uptime)
        .bind(&row.disk_report)
        .execute(&self.pool)
        .await?;

        debug!("report stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn latest(&self, hostname: &str, limit: usize) -> StorageResult<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE hostname = ? ORDER BY timestamp DESC LIMIT ?"
        );

        let rows: Vec<ReportRow> = sqlx::query_as(&sql)
            .bind(hostname)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        debug!("query returned {} reports", rows.len());
        rows_to_reports(rows)
    }

    #[instrument(skip(self))]
    async fn latest_for_all_hosts(&self) -> StorageResult<Vec<Report>> {
        let sql = format!(
            r#"
            SELECT {REPORT_COLUMNS} FROM reports r
            WHERE r.timestamp = (
                SELECT MAX(timestamp) FROM reports WHERE hostname = r.hostname
            )
            ORDER BY r.hostname ASC
            "#
        );

        let rows: Vec<ReportRow> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;
        rows_to_reports(rows)
    }
}

#[async_trait]
impl HostRegistry for SqliteBackend {
    #[instrument(skip(self))]
    async fn ensure(&self, hostname: &str) -> StorageResult<bool> {
        let result = sqlx::query("INSERT INTO hosts (host) VALUES (?) ON CONFLICT (host) DO NOTHING")
            .bind(hostname)
            .execute(&self.pool)
            .await?;

        let created = result.rows_affected() == 1;
        if created {
            info!("registered new host {hostname}");
        }
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn list_all(&self) -> StorageResult<Vec<String>> {
        let hosts = sqlx::query_scalar("SELECT host FROM hosts ORDER BY host ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(hosts)
    }
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => {
                let mut metadata = HashMap::new();
                metadata.insert("backend".to_string(), "sqlite".to_string());
                metadata.insert("db_path".to_string(), self.db_path.clone());

                Ok(HealthStatus {
                    healthy: true,
                    message: "SQLite backend operational".to_string(),
                    metadata,
                })
            }
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata: HashMap::new(),
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing SQLite backend");
        self.pool.close().await;
        Ok(())
    }
}
