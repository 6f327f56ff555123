//! End-to-end tests for the report pipeline
//!
//! These tests verify that:
//! - A rising load between two reports produces exactly one notification
//! - Disk alerts fire on the first report and respect the throttle interval
//! - Store and transport failures never escape as panics
//! - Concurrent first reports register a host exactly once
//! - A report that cannot be stored is rejected before it reaches the store

use std::sync::Arc;

use assert_matches::assert_matches;
use futures::future::join_all;
use hostmon::{
    codec::{DecodeError, Protocol, decode},
    evaluator::{AlertEvent, AlertKind},
    notify::{Delivery, DeliveryStats, Notification},
    pipeline::PipelineError,
    storage::{HostRegistry, ReportStore, memory::MemoryBackend},
};
use pretty_assertions::assert_eq;

use crate::helpers::{
    FailingStore, FailingTransport, ManualClock, RecordingTransport, build_pipeline, csv_line,
};

#[tokio::test]
async fn test_rising_load_notifies_once() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport.clone(), ManualClock::new(1000));

    let first = pipeline
        .ingest_raw(&csv_line(1000, "web01", 0.5, 2.0, "/ 50 /home 30"), Protocol::Csv)
        .await
        .unwrap();
    assert!(first.new_host);
    assert!(first.evaluation.alerts.is_empty());

    let second = pipeline
        .ingest_raw(&csv_line(1060, "web01", 4.2, 2.0, "/ 50 /home 30"), Protocol::Csv)
        .await
        .unwrap();
    assert!(!second.new_host);
    assert_eq!(second.evaluation.deliveries, vec![Delivery::Sent]);

    assert_eq!(
        transport.sent().await,
        vec![Notification {
            subject: "System load warning on web01".to_string(),
            body: "System load has reached 4.20 from 0.50".to_string(),
        }]
    );

    let stored = store.latest("web01", 10).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].timestamp, 1060);
}

#[tokio::test]
async fn test_load_rise_and_full_disk_alert_once_each() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store, transport.clone(), ManualClock::new(1060));

    let a = decode(&csv_line(1000, "web01", 0.5, 2.0, "/ 50"), Protocol::Csv).unwrap();
    let outcome = pipeline.ingest(a).await.unwrap();
    assert!(outcome.evaluation.alerts.is_empty());

    let b = decode(&csv_line(1060, "web01", 4.2, 2.0, "/ 95"), Protocol::Csv).unwrap();
    let outcome = pipeline.ingest(b).await.unwrap();

    let kinds: Vec<AlertKind> = outcome.evaluation.alerts.iter().map(AlertEvent::kind).collect();
    assert_eq!(kinds, vec![AlertKind::Load, AlertKind::Disk]);
    assert_eq!(
        outcome.evaluation.deliveries,
        vec![Delivery::Sent, Delivery::Sent]
    );

    let subjects: Vec<String> = transport.sent().await.into_iter().map(|n| n.subject).collect();
    assert_eq!(
        subjects,
        vec![
            "System load warning on web01".to_string(),
            "Disk utilization warning on web01".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_oversized_memory_never_poisons_host() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        hostmon::storage::sqlite::SqliteBackend::new(temp_dir.path().join("hostmon.db"))
            .await
            .unwrap(),
    );
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport, ManualClock::new(1060));

    let result = pipeline
        .ingest_raw(
            "1000,web01,4,18446744073709551615,0.5,0.4,0.3,2.0,/ 50",
            Protocol::Csv,
        )
        .await;
    assert_matches!(
        result,
        Err(PipelineError::Decode(DecodeError::InvalidField {
            field: "Memtotal",
            ..
        }))
    );

    pipeline
        .ingest_raw(&csv_line(1060, "web01", 0.5, 2.0, "/ 50"), Protocol::Csv)
        .await
        .unwrap();
    assert_eq!(store.latest("web01", 10).await.unwrap().len(), 1);
    assert_matches!(pipeline.reevaluate("web01").await, Ok(_));
}

#[tokio::test]
async fn test_first_report_fires_disk_alert_per_mount() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store, transport.clone(), ManualClock::new(1000));

    let outcome = pipeline
        .ingest_raw(
            &csv_line(1000, "db01", 50.0, 99.0, "/ 95 /var 92 /tmp 10"),
            Protocol::Csv,
        )
        .await
        .unwrap();

    assert_eq!(outcome.evaluation.alerts.len(), 2);

    let bodies: Vec<String> = transport.sent().await.into_iter().map(|n| n.body).collect();
    assert_eq!(
        bodies,
        vec![
            "Disk utilization on / has reached 95%".to_string(),
            "Disk utilization on /var has reached 92%".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_disk_throttle_window() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let clock = ManualClock::new(1000);
    let pipeline = build_pipeline(store, transport.clone(), clock.clone());

    pipeline
        .ingest_raw(&csv_line(1000, "web01", 0.1, 0.0, "/ 95"), Protocol::Csv)
        .await
        .unwrap();
    assert_eq!(transport.sent().await.len(), 1);

    clock.set(1030);
    let outcome = pipeline
        .ingest_raw(&csv_line(1030, "web01", 0.1, 0.0, "/ 95"), Protocol::Csv)
        .await
        .unwrap();
    assert!(outcome.evaluation.alerts.is_empty());
    assert_eq!(transport.sent().await.len(), 1);

    clock.set(1061);
    pipeline
        .ingest_raw(&csv_line(1061, "web01", 0.1, 0.0, "/ 95"), Protocol::Csv)
        .await
        .unwrap();
    assert_eq!(transport.sent().await.len(), 2);

    assert_eq!(
        pipeline.dispatcher().throttle().last_notified("web01", hostmon::Mount::Root).await,
        Some(1061)
    );
}

#[tokio::test]
async fn test_store_unavailable_aborts_report() {
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(Arc::new(FailingStore), transport.clone(), ManualClock::new(1000));

    let result = pipeline
        .ingest_raw(&csv_line(1000, "web01", 9.0, 90.0, "/ 99"), Protocol::Csv)
        .await;

    assert_matches!(result, Err(PipelineError::StoreUnavailable(_)));
    assert!(transport.sent().await.is_empty());
}

#[tokio::test]
async fn test_transport_failure_still_claims_throttle() {
    let store = Arc::new(MemoryBackend::new());
    let clock = ManualClock::new(1000);
    let pipeline = build_pipeline(store, Arc::new(FailingTransport), clock.clone());

    let outcome = pipeline
        .ingest_raw(&csv_line(1000, "web01", 0.1, 0.0, "/ 95"), Protocol::Csv)
        .await
        .unwrap();
    assert_eq!(outcome.evaluation.deliveries, vec![Delivery::Failed]);

    clock.set(1030);
    let outcome = pipeline
        .ingest_raw(&csv_line(1030, "web01", 0.1, 0.0, "/ 95"), Protocol::Csv)
        .await
        .unwrap();
    assert!(outcome.evaluation.alerts.is_empty());

    assert_eq!(
        pipeline.dispatcher().stats(),
        DeliveryStats {
            sent: 0,
            failed: 1,
            throttled: 0
        }
    );
}

#[tokio::test]
async fn test_concurrent_first_reports_register_host_once() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store.clone(), transport, ManualClock::new(1000));

    let mut tasks = vec![];
    for i in 0..16 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .ingest_raw(&csv_line(1000 + i, "web01", 0.1, 0.0, "/ 10"), Protocol::Csv)
                .await
                .unwrap()
                .new_host
        }));
    }

    let created = join_all(tasks)
        .await
        .into_iter()
        .filter(|created| *created.as_ref().unwrap())
        .count();

    assert_eq!(created, 1);
    assert_eq!(store.list_all().await.unwrap(), vec!["web01"]);
    assert_eq!(store.latest("web01", 100).await.unwrap().len(), 16);
}

#[tokio::test]
async fn test_concurrent_disk_evaluations_notify_once() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let pipeline = build_pipeline(store, transport.clone(), ManualClock::new(1000));

    let mut tasks = vec![];
    for i in 0..8 {
        let pipeline = pipeline.clone();
        tasks.push(tokio::spawn(async move {
            pipeline
                .ingest_raw(&csv_line(1000 + i, "web01", 0.1, 0.0, "/ 97"), Protocol::Csv)
                .await
                .unwrap();
        }));
    }
    for result in join_all(tasks).await {
        result.unwrap();
    }

    assert_eq!(transport.sent().await.len(), 1);
}
