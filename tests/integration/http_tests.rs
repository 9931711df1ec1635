//! Metrics endpoint integration tests
//!
//! Serves the exporter router on a real socket and scrapes it over TCP.

use std::net::{SocketAddr, TcpListener as StdListener};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;

use sormas_usage_exporter::metrics::{self as usage_metrics, AppState, CycleCounts};
use sormas_usage_exporter::GaugeSet;

fn free_addr() -> SocketAddr {
    let listener = StdListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = None;
    for _ in 0..50 {
        match TcpStream::connect(addr).await {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let mut stream = stream.expect("metrics endpoint did not come up");

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, addr
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn test_scrape_over_tcp_and_shutdown() {
    let gauges = Arc::new(GaugeSet::new());
    let mut counts = CycleCounts::default();
    counts.record_named("contacts", 10);
    counts.record_named("sessions", 2);
    gauges.apply(&counts);

    let addr = free_addr();
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let server = tokio::spawn(usage_metrics::serve(
        addr,
        AppState::new(gauges, None),
        async move {
            let _ = shutdown_rx.changed().await;
        },
    ));

    let response = http_get(addr, "/metrics").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("text/plain; version=0.0.4"));
    assert!(response.contains("\nsormas_usage_contacts 10\n"));
    assert!(response.contains("\nsormas_usage_sessions 2\n"));
    assert!(response.contains("\nsormas_usage_users 0\n"));

    let health = http_get(addr, "/healthz").await;
    assert!(health.starts_with("HTTP/1.1 200 OK"));
    assert!(health.ends_with("ok"));

    shutdown_tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_bind_conflict_is_reported() {
    let taken = StdListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap();

    let result = usage_metrics::serve(
        addr,
        AppState::new(Arc::new(GaugeSet::new()), None),
        std::future::pending(),
    )
    .await;

    assert!(result.is_err());
}
