// ABOUTME: Instance lifecycle backends: the orchestrator the rollout drives.
// ABOUTME: Defines the InstanceBackend trait plus simulated and container implementations.

mod container;
mod detection;
mod error;
mod simulated;

pub use container::ContainerBackend;
pub use detection::{RuntimeInfo, RuntimeType, detect_local};
pub use error::{BackendError, BackendErrorKind};
pub use simulated::{BackendCall, SimulatedBackend};

use async_trait::async_trait;

use crate::types::{Instance, Revision, ServiceName};

/// Creates, destroys, and lists the running instances of a revision.
///
/// Backends may be eventually consistent: an instance returned by `create`
/// is allowed to be missing from `list` for a while.
#[async_trait]
pub trait InstanceBackend: Send + Sync {
    /// Start one new instance of `revision`.
    async fn create(&self, revision: &Revision) -> Result<Instance, BackendError>;

    /// Stop and remove an instance. Removing an instance that is already
    /// gone is not an error.
    async fn destroy(&self, instance: &Instance) -> Result<(), BackendError>;

    /// Instances currently running for `revision`.
    async fn list(&self, revision: &Revision) -> Result<Vec<Instance>, BackendError>;

    /// Instances of every revision of `service`.
    async fn list_service(&self, service: &ServiceName) -> Result<Vec<Instance>, BackendError>;
}
