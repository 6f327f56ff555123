//! Helper types and functions for integration tests

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use hostmon::{
    evaluator::Thresholds,
    notify::{Dispatcher, MailTransport, Notification, NotifyError},
    pipeline::{Clock, Pipeline},
    report::Report,
    storage::{HealthStatus, HostRegistry, ReportStore, StorageBackend, StorageError, StorageResult},
    throttle::ThrottleState,
};
use tokio::sync::Mutex;

/// Mail transport that keeps every notification in memory
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingTransport {
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Mail transport whose relay is always down
pub struct FailingTransport;

#[async_trait]
impl MailTransport for FailingTransport {
    async fn send(&self, _: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Unavailable("connection refused".to_string()))
    }
}

/// Clock the test moves by hand
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(now)))
    }

    pub fn set(&self, now: i64) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Store whose database is unreachable
pub struct FailingStore;

fn unreachable() -> StorageError {
    StorageError::ConnectionFailed("database unreachable".to_string())
}

#[async_trait]
impl ReportStore for FailingStore {
    async fn append(&self, _: &Report) -> StorageResult<()> {
        Err(unreachable())
    }

    async fn latest(&self, _: &str, _: usize) -> StorageResult<Vec<Report>> {
        Err(unreachable())
    }

    async fn latest_for_all_hosts(&self) -> StorageResult<Vec<Report>> {
        Err(unreachable())
    }
}

#[async_trait]
impl HostRegistry for FailingStore {
    async fn ensure(&self, _: &str) -> StorageResult<bool> {
        Err(unreachable())
    }

    async fn list_all(&self) -> StorageResult<Vec<String>> {
        Err(unreachable())
    }
}

#[async_trait]
impl StorageBackend for FailingStore {
    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: false,
            message: "database unreachable".to_string(),
            metadata: Default::default(),
        })
    }

    async fn close(&self) -> StorageResult<()> {
        Ok(())
    }
}

pub fn test_thresholds() -> Thresholds {
    Thresholds {
        load_abs: 1.0,
        load_delta: 1.0,
        swap_abs_pct: 30.0,
        swap_delta_pct: 5.0,
        disk_pct: 90,
        disk_report_interval_secs: 60,
    }
}

pub fn build_pipeline(
    store: Arc<dyn StorageBackend>,
    transport: Arc<dyn MailTransport>,
    clock: Arc<dyn Clock>,
) -> Arc<Pipeline> {
    let thresholds = test_thresholds();
    let dispatcher = Arc::new(Dispatcher::new(
        transport,
        Arc::new(ThrottleState::new()),
        thresholds.disk_report_interval_secs,
    ));

    Arc::new(Pipeline::new(store, thresholds, dispatcher).with_clock(clock))
}

/// One report in the csv line protocol
pub fn csv_line(timestamp: i64, hostname: &str, load_one: f64, swap: f64, disk: &str) -> String {
    format!("{timestamp},{hostname},4,8000000,{load_one:.2},0.40,0.30,{swap:.1},{disk}")
}
