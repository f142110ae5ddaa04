// ABOUTME: Container backend over the Docker-compatible API using bollard.
// ABOUTME: Instances are labelled containers; works with Docker and Podman.

use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{ContainerCreateBody, EndpointSettings};
use bollard::query_parameters::{
    CreateContainerOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::detection::{RuntimeInfo, detect_local};
use super::{BackendError, InstanceBackend};
use crate::types::{Instance, InstanceId, Revision, RevisionId, ServiceName};

pub const LABEL_SERVICE: &str = "rollwatch.service";
pub const LABEL_REVISION: &str = "rollwatch.revision";
pub const LABEL_MANAGED: &str = "rollwatch.managed";

/// Seconds a container gets to shut down before it is killed.
const STOP_GRACE_SECS: i32 = 10;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn map_error(operation: &'static str, e: bollard::errors::Error) -> BackendError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if (400..500).contains(status_code) => BackendError::Rejected {
            operation,
            message: message.clone(),
        },
        _ => BackendError::unavailable(format!("{operation}: {e}")),
    }
}

fn is_gone(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

fn is_already_stopped(e: &bollard::errors::Error) -> bool {
    matches!(
        e,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

fn first_ip(networks: Option<&HashMap<String, EndpointSettings>>) -> Option<String> {
    networks?
        .values()
        .filter_map(|endpoint| endpoint.ip_address.clone())
        .find(|ip| !ip.is_empty())
}

// =============================================================================
// ContainerBackend
// =============================================================================

/// Runs each instance as a container on the local Docker or Podman daemon.
pub struct ContainerBackend {
    client: Docker,
    runtime: RuntimeInfo,
    probe_port: u16,
    /// Disambiguates creates that land in the same millisecond.
    sequence: AtomicU64,
}

impl ContainerBackend {
    /// Connect to an explicit socket, or auto-detect one.
    ///
    /// `probe_port` is the container port the probes target; it is combined
    /// with the container's network IP to form the instance endpoint.
    pub fn connect(socket: Option<&str>, probe_port: u16) -> Result<Self, BackendError> {
        let runtime = match socket {
            Some(path) => RuntimeInfo::from_socket(path),
            None => detect_local()?,
        };

        let client = Docker::connect_with_unix(&runtime.socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| {
                BackendError::unavailable(format!(
                    "failed to connect to {}: {}",
                    runtime.socket_path, e
                ))
            })?;

        tracing::debug!(
            runtime = %runtime.runtime_type,
            socket = %runtime.socket_path,
            "connected to container runtime"
        );

        Ok(Self {
            client,
            runtime,
            probe_port,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn runtime(&self) -> &RuntimeInfo {
        &self.runtime
    }

    fn container_name(revision: &Revision, created_at: DateTime<Utc>, seq: u64) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            revision.service,
            revision.id,
            created_at.timestamp_millis(),
            std::process::id(),
            seq
        )
    }

    fn labels_for(revision: &Revision) -> HashMap<String, String> {
        HashMap::from([
            (LABEL_SERVICE.to_string(), revision.service.to_string()),
            (LABEL_REVISION.to_string(), revision.id.to_string()),
            (LABEL_MANAGED.to_string(), "true".to_string()),
        ])
    }

    async fn list_with_labels(
        &self,
        labels: &[(&str, &str)],
    ) -> Result<Vec<Instance>, BackendError> {
        let label_filters = labels
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect();
        let filters = HashMap::from([("label".to_string(), label_filters)]);

        let opts = ListContainersOptions {
            all: false,
            filters: Some(filters),
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(|e| map_error("list", e))?;

        Ok(containers
            .into_iter()
            .filter_map(|c| {
                let id = c.id?;
                let container_labels = c.labels.unwrap_or_default();
                let revision = container_labels.get(LABEL_REVISION)?.clone();
                let created_at = c
                    .created
                    .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now);
                let endpoint = first_ip(
                    c.network_settings
                        .as_ref()
                        .and_then(|settings| settings.networks.as_ref()),
                )
                .map(|ip| format!("{}:{}", ip, self.probe_port));

                Some(Instance {
                    id: InstanceId::new(id),
                    revision: RevisionId::new(revision),
                    image: c.image.unwrap_or_default(),
                    created_at,
                    endpoint,
                })
            })
            .collect())
    }
}

#[async_trait]
impl InstanceBackend for ContainerBackend {
    async fn create(&self, revision: &Revision) -> Result<Instance, BackendError> {
        let created_at = Utc::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = Self::container_name(revision, created_at, seq);

        let body = ContainerCreateBody {
            image: Some(revision.image.clone()),
            labels: Some(Self::labels_for(revision)),
            ..Default::default()
        };
        let opts = CreateContainerOptions {
            name: Some(name),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(|e| map_error("create", e))?;

        if let Err(e) = self
            .client
            .start_container(&response.id, None::<StartContainerOptions>)
            .await
        {
            // Don't leave a created-but-never-started container behind.
            let _ = self
                .client
                .remove_container(
                    &response.id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await;
            return Err(map_error("start", e));
        }

        let details = self
            .client
            .inspect_container(&response.id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| map_error("inspect", e))?;

        let endpoint = first_ip(
            details
                .network_settings
                .as_ref()
                .and_then(|settings| settings.networks.as_ref()),
        )
        .map(|ip| format!("{}:{}", ip, self.probe_port));

        Ok(Instance {
            id: InstanceId::new(response.id),
            revision: revision.id.clone(),
            image: revision.image.clone(),
            created_at,
            endpoint,
        })
    }

    async fn destroy(&self, instance: &Instance) -> Result<(), BackendError> {
        let id = instance.id.as_str();

        let stop = self
            .client
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: Some(STOP_GRACE_SECS),
                    signal: None,
                }),
            )
            .await;
        match stop {
            Ok(()) => {}
            Err(e) if is_gone(&e) => return Ok(()),
            Err(e) if is_already_stopped(&e) => {}
            Err(e) => return Err(map_error("stop", e)),
        }

        match self
            .client
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_gone(&e) => Ok(()),
            Err(e) => Err(map_error("remove", e)),
        }
    }

    async fn list(&self, revision: &Revision) -> Result<Vec<Instance>, BackendError> {
        self.list_with_labels(&[
            (LABEL_SERVICE, revision.service.as_str()),
            (LABEL_REVISION, revision.id.as_str()),
            (LABEL_MANAGED, "true"),
        ])
        .await
    }

    async fn list_service(&self, service: &ServiceName) -> Result<Vec<Instance>, BackendError> {
        self.list_with_labels(&[(LABEL_SERVICE, service.as_str()), (LABEL_MANAGED, "true")])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_identify_service_and_revision() {
        let revision = Revision::new(
            ServiceName::new("api").unwrap(),
            RevisionId::new("abc123"),
            "api:abc123",
            2,
        );
        let labels = ContainerBackend::labels_for(&revision);
        assert_eq!(labels.get(LABEL_SERVICE).map(String::as_str), Some("api"));
        assert_eq!(labels.get(LABEL_REVISION).map(String::as_str), Some("abc123"));
        assert_eq!(labels.get(LABEL_MANAGED).map(String::as_str), Some("true"));
    }

    #[test]
    fn names_differ_within_one_millisecond() {
        let revision = Revision::new(
            ServiceName::new("api").unwrap(),
            RevisionId::new("abc123"),
            "api:abc123",
            2,
        );
        let now = Utc::now();
        let first = ContainerBackend::container_name(&revision, now, 0);
        let second = ContainerBackend::container_name(&revision, now, 1);
        assert_ne!(first, second);
        assert!(first.starts_with("api-abc123-"));
    }

    #[test]
    fn first_ip_skips_empty_addresses() {
        let networks = HashMap::from([(
            "bridge".to_string(),
            EndpointSettings {
                ip_address: Some("172.17.0.5".to_string()),
                ..Default::default()
            },
        )]);
        assert_eq!(first_ip(Some(&networks)).as_deref(), Some("172.17.0.5"));

        let empty = HashMap::from([(
            "none".to_string(),
            EndpointSettings {
                ip_address: Some(String::new()),
                ..Default::default()
            },
        )]);
        assert_eq!(first_ip(Some(&empty)), None);
        assert_eq!(first_ip(None), None);
    }
}
