// ABOUTME: Revision and Instance records exchanged with backends.
// ABOUTME: A revision is immutable; instances are running copies of one.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{InstanceId, RevisionId, ServiceName};

/// One deployable build of a service.
///
/// Revisions are superseded, never mutated: a new build gets a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub id: RevisionId,
    pub service: ServiceName,
    /// Artifact the instances run (an image reference for container backends).
    pub image: String,
    pub replicas: u32,
    pub created_at: DateTime<Utc>,
}

impl Revision {
    pub fn new(service: ServiceName, id: RevisionId, image: impl Into<String>, replicas: u32) -> Self {
        Self {
            id,
            service,
            image: image.into(),
            replicas,
            created_at: Utc::now(),
        }
    }
}

/// One running copy of a revision as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instance {
    pub id: InstanceId,
    pub revision: RevisionId,
    pub image: String,
    pub created_at: DateTime<Utc>,
    /// `host:port` the probes talk to, when the backend knows one.
    pub endpoint: Option<String>,
}
