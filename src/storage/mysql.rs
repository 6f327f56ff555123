//! MySQL storage backend implementation
//!
//! The deployment target of the hub: a shared MySQL server reachable with the
//! `dbUser`/`dbPass`/`dbHost`/`dbName` directives. Connections are pooled and
//! every statement is parameterized.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::{MySql, Pool};
use tracing::{debug, info, instrument, warn};

use super::backend::{HealthStatus, HostRegistry, ReportStore, StorageBackend};
use super::error::{StorageError, StorageResult};
use super::schema::{REPORT_COLUMNS, ReportRow, rows_to_reports};
use crate::config::DatabaseConfig;
use crate::report::Report;

/// Default MySQL port
const MYSQL_PORT: u16 = 3306;

/// MySQL storage backend
pub struct MySqlBackend {
    pool: Pool<MySql>,
    host: String,
    database: String,
}

impl MySqlBackend {
    /// Connect to the configured server and run migrations
    #[instrument(skip_all, fields(host = %config.host, database = %config.name))]
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        info!("connecting to MySQL at {}:{MYSQL_PORT}", config.host);

        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(MYSQL_PORT)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name);

        let pool = MySqlPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        debug!("running database migrations");
        sqlx::migrate!("./migrations/mysql").run(&pool).await?;

        info!("database migrations complete");

        Ok(Self {
            pool,
            host: config.host.clone(),
            database: config.name.clone(),
        })
    }
}

#[async_trait]
impl ReportStore for MySqlBackend {
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
            ON DUPLICATE KEY UPDATE
                num_cpus = VALUES(num_cpus),
                mem_total_kb = VALUES(mem_total_kb),
                load_one = VALUES(load_one),
                load_five = VALUES(load_five),
                load_fifteen = VALUES(load_fifteen),
                swap_used_pct = VALUES(swap_used_pct),
                kernel_version = VALUES(kernel_version),
                os_release = VALUES(os_release),
                uptime = VALUES(uptime),
                disk_report = VALUES(disk_report)
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
impl HostRegistry for MySqlBackend {
    #[instrument(skip(self))]
    async fn ensure(&self, hostname: &str) -> StorageResult<bool> {
        let result = sqlx::query("INSERT IGNORE INTO hosts (host) VALUES (?)")
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
impl StorageBackend for MySqlBackend {
    #[instrument(skip(self))]
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let metadata = HashMap::from([
            ("backend".to_string(), "mysql".to_string()),
            ("host".to_string(), self.host.clone()),
            ("database".to_string(), self.database.clone()),
        ]);

        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => Ok(HealthStatus {
                healthy: true,
                message: "MySQL backend operational".to_string(),
                metadata,
            }),
            Err(e) => {
                warn!("health check failed: {}", e);
                Ok(HealthStatus {
                    healthy: false,
                    message: format!("health check failed: {}", e),
                    metadata,
                })
            }
        }
    }

    async fn close(&self) -> StorageResult<()> {
        info!("closing MySQL backend");
        self.pool.close().await;
        Ok(())
    }
}
