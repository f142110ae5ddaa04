// ABOUTME: Container runtime socket detection for the container backend.
// ABOUTME: Checks Podman sockets first, then Docker.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::BackendError;

/// The container runtime behind a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A runtime socket to connect to.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

impl RuntimeInfo {
    /// Describe an explicitly configured socket.
    pub fn from_socket(socket_path: &str) -> Self {
        let runtime_type = if socket_path.contains("podman") {
            RuntimeType::Podman
        } else {
            RuntimeType::Docker
        };
        Self {
            runtime_type,
            socket_path: socket_path.to_string(),
        }
    }
}

const ROOTFUL_PODMAN: &str = "/run/podman/podman.sock";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Detect a container runtime on the local system.
///
/// Detection order:
/// 1. Rootless Podman socket (`/run/user/$UID/podman/podman.sock`)
/// 2. Rootful Podman socket (`/run/podman/podman.sock`)
/// 3. Docker socket (`/var/run/docker.sock`)
pub fn detect_local() -> Result<RuntimeInfo, BackendError> {
    if let Some(uid) = current_uid() {
        let rootless = format!("/run/user/{}/podman/podman.sock", uid);
        if Path::new(&rootless).exists() {
            return Ok(RuntimeInfo {
                runtime_type: RuntimeType::Podman,
                socket_path: rootless,
            });
        }
    }

    for (path, runtime_type) in [
        (ROOTFUL_PODMAN, RuntimeType::Podman),
        (DOCKER_SOCKET, RuntimeType::Docker),
    ] {
        if Path::new(path).exists() {
            return Ok(RuntimeInfo {
                runtime_type,
                socket_path: path.to_string(),
            });
        }
    }

    Err(BackendError::unavailable(
        "no container runtime found (checked Podman and Docker sockets)",
    ))
}

fn current_uid() -> Option<String> {
    std::env::var("UID").ok().or_else(|| {
        std::fs::read_to_string("/proc/self/status")
            .ok()
            .and_then(|s| {
                s.lines()
                    .find(|l| l.starts_with("Uid:"))
                    .and_then(|l| l.split_whitespace().nth(1))
                    .map(|s| s.to_string())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_podman_socket_is_recognised() {
        let info = RuntimeInfo::from_socket("/run/user/1000/podman/podman.sock");
        assert_eq!(info.runtime_type, RuntimeType::Podman);
    }

    #[test]
    fn other_sockets_default_to_docker() {
        let info = RuntimeInfo::from_socket("/var/run/docker.sock");
        assert_eq!(info.runtime_type, RuntimeType::Docker);
        assert_eq!(info.runtime_type.to_string(), "docker");
    }
}
