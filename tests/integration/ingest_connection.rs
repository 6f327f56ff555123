//! Integration tests for the TCP line-protocol front end
//!
//! These tests verify that:
//! - Reports written over a socket reach the store and raise alerts
//! - A malformed line closes only the offending connection
//! - Several agents can report concurrently

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hostmon::{
    codec::Protocol,
    ingest::Listener,
    pipeline::Pipeline,
    storage::{HostRegistry, ReportStore, memory::MemoryBackend},
};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::helpers::{ManualClock, RecordingTransport, build_pipeline, csv_line};

async fn spawn_listener(pipeline: Arc<Pipeline>) -> SocketAddr {
    let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), pipeline, Protocol::Csv)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(listener.run());
    addr
}

/// Poll until the store holds `count` reports for `host`
async fn wait_for_reports(store: &MemoryBackend, host: &str, count: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while store.latest(host, 100).await.unwrap().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("reports did not arrive in time");
}

/// Wait for the server side to close the connection
async fn wait_for_close(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let read = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
        .await
        .expect("connection was not closed");

    // a reset counts as closed as well
    assert_eq!(read.unwrap_or(0), 0);
}

#[tokio::test]
async fn test_reports_over_tcp() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let addr = spawn_listener(build_pipeline(store.clone(), transport.clone(), ManualClock::new(1000))).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let payload = format!(
        "{}\n{}\n",
        csv_line(1000, "web01", 0.5, 2.0, "/ 50"),
        csv_line(1060, "web01", 4.2, 2.0, "/ 50"),
    );
    stream.write_all(payload.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();

    wait_for_reports(&store, "web01", 2).await;

    let sent = transport.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "System load warning on web01");
}

#[tokio::test]
async fn test_malformed_line_closes_only_that_connection() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let addr = spawn_listener(build_pipeline(store.clone(), transport, ManualClock::new(1000))).await;

    let mut bad = TcpStream::connect(addr).await.unwrap();
    let payload = format!("{}\nnot,a,report\n", csv_line(1000, "web01", 0.5, 2.0, "/ 50"));
    bad.write_all(payload.as_bytes()).await.unwrap();

    wait_for_close(&mut bad).await;
    assert_eq!(store.latest("web01", 10).await.unwrap().len(), 1);

    let mut good = TcpStream::connect(addr).await.unwrap();
    good.write_all(format!("{}\n", csv_line(1060, "web01", 0.5, 2.0, "/ 50")).as_bytes())
        .await
        .unwrap();
    good.shutdown().await.unwrap();

    wait_for_reports(&store, "web01", 2).await;
}

#[tokio::test]
async fn test_concurrent_agents() {
    let store = Arc::new(MemoryBackend::new());
    let transport = Arc::new(RecordingTransport::default());
    let addr = spawn_listener(build_pipeline(store.clone(), transport, ManualClock::new(1000))).await;

    let mut agents = vec![];
    for i in 0..10 {
        agents.push(tokio::spawn(async move {
            let host = format!("node{i:02}");
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for t in 0..5 {
                let line = format!("{}\n", csv_line(1000 + t * 60, &host, 0.1, 0.0, "/ 20"));
                stream.write_all(line.as_bytes()).await.unwrap();
            }
            stream.shutdown().await.unwrap();
            host
        }));
    }

    let mut hosts = vec![];
    for agent in agents {
        hosts.push(agent.await.unwrap());
    }

    for host in &hosts {
        wait_for_reports(&store, host, 5).await;
    }

    assert_eq!(store.list_all().await.unwrap(), hosts);
}
