// ABOUTME: Integration tests for the HTTP probe target.
// ABOUTME: Serves canned responses from a local TCP listener.

use chrono::Utc;
use rollwatch::config::ProbeConfig;
use rollwatch::probe::{HttpProbe, ProbeKind, ProbeOutcome, ProbeTarget};
use rollwatch::types::{Instance, InstanceId, RevisionId};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

fn instance(endpoint: Option<String>) -> Instance {
    Instance {
        id: InstanceId::new("sim-1"),
        revision: RevisionId::new("v2"),
        image: "registry.example.com/enrichment-api:v2".to_string(),
        created_at: Utc::now(),
        endpoint,
    }
}

fn config(port: u16) -> ProbeConfig {
    ProbeConfig {
        port,
        ..ProbeConfig::default()
    }
}

/// Answer one request with `status_line`, returning the request head it saw.
async fn serve_once(status_line: &'static str) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let task = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 4096];
        let mut head = Vec::new();
        while !head.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            head.extend_from_slice(&buf[..n]);
        }
        let response = format!("{status_line}\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok");
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        String::from_utf8_lossy(&head).to_string()
    });
    (port, task)
}

#[tokio::test]
async fn ok_status_is_success() {
    let (port, server) = serve_once("HTTP/1.1 200 OK").await;
    let target = instance(Some(format!("127.0.0.1:{port}")));

    let outcome = HttpProbe::new()
        .check(&target, ProbeKind::Readiness, &config(port))
        .await;
    assert_eq!(outcome, ProbeOutcome::Success);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /healthz HTTP/1.1"), "{request}");
    assert!(request.to_lowercase().contains(&format!("host: 127.0.0.1:{port}")));
}

#[tokio::test]
async fn redirect_is_success() {
    let (port, _server) = serve_once("HTTP/1.1 302 Found").await;
    let target = instance(Some("127.0.0.1".to_string()));

    let outcome = HttpProbe::new()
        .check(&target, ProbeKind::Liveness, &config(port))
        .await;
    assert_eq!(outcome, ProbeOutcome::Success);
}

#[tokio::test]
async fn server_error_is_definitive_failure() {
    let (port, _server) = serve_once("HTTP/1.1 503 Service Unavailable").await;
    let target = instance(Some(format!("127.0.0.1:{port}")));

    let outcome = HttpProbe::new()
        .check(&target, ProbeKind::Readiness, &config(port))
        .await;
    assert!(matches!(outcome, ProbeOutcome::Failure(ref msg) if msg.contains("503")));
}

#[tokio::test]
async fn refused_connection_is_transient() {
    // Bind and drop to find a port nothing listens on.
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let target = instance(Some(format!("127.0.0.1:{port}")));

    let outcome = HttpProbe::new()
        .check(&target, ProbeKind::Readiness, &config(port))
        .await;
    assert!(matches!(outcome, ProbeOutcome::Transient(_)));
}

#[tokio::test]
async fn missing_endpoint_is_transient() {
    let outcome = HttpProbe::new()
        .check(&instance(None), ProbeKind::Liveness, &config(8080))
        .await;
    assert!(matches!(outcome, ProbeOutcome::Transient(_)));
}
