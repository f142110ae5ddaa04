// ABOUTME: HTTP probe target: GET the probe path on the instance endpoint.
// ABOUTME: Uses a bare hyper HTTP/1 client connection per check.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::{ProbeKind, ProbeOutcome, ProbeTarget};
use crate::config::ProbeConfig;
use crate::types::Instance;

/// Probes `http://<endpoint host>:<probe port><probe path>`.
///
/// 2xx and 3xx are healthy; any other status is a definitive failure.
/// Connection problems are transient. The per-check timeout is applied by
/// the scheduler.
#[derive(Debug, Clone, Default)]
pub struct HttpProbe;

impl HttpProbe {
    pub fn new() -> Self {
        Self
    }
}

/// Host part of an endpoint, accepting `host`, `host:port`, and `[v6]:port`.
fn endpoint_host(endpoint: &str) -> &str {
    if let Some(rest) = endpoint.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.parse::<u16>().is_ok() => host,
        _ => endpoint,
    }
}

fn authority(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[async_trait]
impl ProbeTarget for HttpProbe {
    async fn check(
        &self,
        instance: &Instance,
        kind: ProbeKind,
        config: &ProbeConfig,
    ) -> ProbeOutcome {
        let Some(endpoint) = instance.endpoint.as_deref() else {
            return ProbeOutcome::Transient("instance has no endpoint yet".to_string());
        };
        let addr = authority(endpoint_host(endpoint), config.port);

        let stream = match TcpStream::connect(&addr).await {
            Ok(stream) => stream,
            Err(e) => return ProbeOutcome::Transient(format!("connect to {addr}: {e}")),
        };
        let io = TokioIo::new(stream);

        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => return ProbeOutcome::Transient(format!("HTTP handshake failed: {e}")),
        };

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!(error = %e, "probe connection closed");
            }
        });

        let req = match hyper::Request::builder()
            .method("GET")
            .uri(config.path.as_str())
            .header("Host", addr.as_str())
            .header("User-Agent", concat!("rollwatch/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => return ProbeOutcome::Failure(format!("invalid probe request: {e}")),
        };

        let resp = match sender.send_request(req).await {
            Ok(resp) => resp,
            Err(e) => return ProbeOutcome::Transient(format!("request failed: {e}")),
        };

        let status = resp.status();
        // Drain the body so the connection shuts down cleanly.
        let _ = resp.into_body().collect().await;

        if status.is_success() || status.is_redirection() {
            ProbeOutcome::Success
        } else {
            tracing::debug!(instance = %instance.id, %kind, %status, "probe returned failure status");
            ProbeOutcome::Failure(format!("{kind} returned {status}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_host_strips_port() {
        assert_eq!(endpoint_host("10.0.0.7:8080"), "10.0.0.7");
        assert_eq!(endpoint_host("10.0.0.7"), "10.0.0.7");
        assert_eq!(endpoint_host("[fd00::1]:8080"), "fd00::1");
        assert_eq!(endpoint_host("fd00::1"), "fd00::1");
    }

    #[test]
    fn authority_brackets_ipv6() {
        assert_eq!(authority("10.0.0.7", 8080), "10.0.0.7:8080");
        assert_eq!(authority("fd00::1", 8080), "[fd00::1]:8080");
    }
}
