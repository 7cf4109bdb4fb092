//! Metrics endpoint over a real socket.

use cert_exporter::server;
use cert_exporter::shutdown::ShutdownCoordinator;
use cert_exporter::{ManualClock, MetricsExporter, SnapshotStore};
use crate::fixtures::{record, start};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn spawn_server(store: Arc<SnapshotStore>) -> (SocketAddr, ShutdownCoordinator) {
    let clock = Arc::new(ManualClock::new(start()));
    let exporter = Arc::new(MetricsExporter::new(store, clock, "sandbox"));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn("metrics-server", async move {
        server::serve(listener, exporter, signal).await.unwrap();
    });
    (addr, coordinator)
}

#[tokio::test]
async fn test_metrics_endpoint_serves_exposition() {
    let store = Arc::new(SnapshotStore::new(start()));
    store.record_success(vec![record("router-tls", 30), record("uaa-tls", 5)], start());
    let (addr, coordinator) = spawn_server(store).await;

    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"],
        "text/plain; version=0.0.4"
    );

    let body = response.text().await.unwrap();
    let samples = body
        .lines()
        .filter(|l| l.starts_with("opsman_certificate_expires_in_seconds{"))
        .count();
    assert_eq!(samples, 2);
    assert!(body.contains(r#"environment="sandbox""#));
    assert!(body.contains("# TYPE opsman_certificate_expires_in_seconds gauge"));

    coordinator.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_concurrent_scrapes_during_publish() {
    let store = Arc::new(SnapshotStore::new(start()));
    let (addr, coordinator) = spawn_server(store.clone()).await;
    let client = reqwest::Client::new();

    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let records = (0..(i % 4 + 1)).map(|n| record(&format!("cert-{n}"), 10)).collect();
                store.record_success(records, start());
                tokio::task::yield_now().await;
            }
        })
    };

    let scrapes: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            let url = format!("http://{addr}/metrics");
            tokio::spawn(async move { client.get(url).send().await?.text().await })
        })
        .collect();

    for scrape in scrapes {
        let body = scrape.await.unwrap().unwrap();
        let samples = body
            .lines()
            .filter(|l| l.starts_with("opsman_certificate_expires_in_seconds{"))
            .count();
        let count_line = body
            .lines()
            .find(|l| l.starts_with("opsman_exporter_certificates{"))
            .unwrap();
        // Sample count and the count gauge come from the same snapshot.
        assert!(count_line.ends_with(&format!(" {samples}")), "{count_line}");
    }
    writer.await.unwrap();

    coordinator.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_healthz_and_unknown_paths() {
    let store = Arc::new(SnapshotStore::new(start()));
    let (addr, coordinator) = spawn_server(store).await;

    let response = reqwest::get(format!("http://{addr}/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    let response = reqwest::get(format!("http://{addr}/nope")).await.unwrap();
    assert_eq!(response.status(), 404);

    coordinator.shutdown(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn test_not_yet_fetched_scrape() {
    let store = Arc::new(SnapshotStore::new(start()));
    let (addr, coordinator) = spawn_server(store).await;

    let body = reqwest::get(format!("http://{addr}/metrics"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.contains("opsman_certificate_expires_in_seconds"));
    assert!(body.contains(r#"opsman_exporter_last_cycle_failed{environment="sandbox",kind="not_yet_fetched"} 1"#));

    coordinator.shutdown(Duration::from_secs(5)).await;
}
