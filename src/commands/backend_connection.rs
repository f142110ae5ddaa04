// ABOUTME: Shared helper for choosing the instance backend and probe target.
// ABOUTME: Simulated rollouts get an in-process backend seeded with a serving baseline.

use rollwatch::backend::{ContainerBackend, InstanceBackend, SimulatedBackend};
use rollwatch::config::{BackendKind, Config};
use rollwatch::error::Result;
use rollwatch::output::Output;
use rollwatch::probe::{HttpProbe, ProbeTarget, ScriptedProbe};
use rollwatch::types::{Revision, RevisionId};
use std::sync::Arc;

/// Connect to the configured backend.
///
/// The simulated backend starts with `replicas` instances of a stand-in
/// previous revision so the rollout has something to replace.
pub fn connect_backend(
    config: &Config,
    target: &Revision,
    output: &Output,
) -> Result<Arc<dyn InstanceBackend>> {
    match config.backend.kind {
        BackendKind::Simulated => {
            let backend = SimulatedBackend::new();
            let previous = Revision::new(
                target.service.clone(),
                RevisionId::new(format!("{}-previous", target.id)),
                target.image.clone(),
                target.replicas,
            );
            backend.seed(&previous, target.replicas);
            output.progress(&format!(
                "  → Simulating {} instance(s) of {}",
                target.replicas, previous.id
            ));
            Ok(Arc::new(backend))
        }
        BackendKind::Container => {
            output.progress("  → Detecting runtime...");
            let backend = ContainerBackend::connect(
                config.backend.socket.as_deref(),
                config.probes.readiness.port,
            )?;
            let runtime = backend.runtime();
            output.progress(&format!(
                "  → Found {} at {}",
                runtime.runtime_type, runtime.socket_path
            ));
            Ok(Arc::new(backend))
        }
    }
}

/// Simulated instances have no endpoint, so they get a probe that always passes.
pub fn probe_for(config: &Config) -> Arc<dyn ProbeTarget> {
    match config.backend.kind {
        BackendKind::Simulated => Arc::new(ScriptedProbe::healthy()),
        BackendKind::Container => Arc::new(HttpProbe::new()),
    }
}
