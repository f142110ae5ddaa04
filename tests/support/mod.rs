// ABOUTME: Test support utilities.
// ABOUTME: Builds revisions, fast probe settings, and simulated rollouts for integration tests.

#![allow(dead_code)]

use rollwatch::backend::{BackendCall, SimulatedBackend};
use rollwatch::config::{ProbeConfig, ProbesConfig};
use rollwatch::events::{EventSink, MemorySink};
use rollwatch::probe::{ProbeTarget, ScriptedProbe};
use rollwatch::rollout::{RolloutController, RolloutSettings};
use rollwatch::types::{Quantity, Revision, RevisionId, ServiceName};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("rollwatch=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn revision(id: &str, replicas: u32) -> Revision {
    Revision::new(
        ServiceName::new("enrichment-api").unwrap(),
        RevisionId::new(id),
        format!("registry.example.com/enrichment-api:{id}"),
        replicas,
    )
}

/// Probes every second with the default threshold of 3.
pub fn fast_probes() -> ProbesConfig {
    let probe = ProbeConfig {
        interval: Duration::from_secs(1),
        timeout: Duration::from_millis(500),
        ..ProbeConfig::default()
    };
    ProbesConfig {
        liveness: probe.clone(),
        readiness: probe,
    }
}

/// desired=4-style defaults: surge 1, unavailable 0, one-second ticks.
pub fn settings() -> RolloutSettings {
    RolloutSettings {
        max_surge: Quantity::Absolute(1),
        max_unavailable: Quantity::Absolute(0),
        tick: Duration::from_secs(1),
        probes: fast_probes(),
        ..RolloutSettings::default()
    }
}

/// A simulated service running `replicas` instances of v1.
pub struct Harness {
    pub backend: Arc<SimulatedBackend>,
    pub events: Arc<MemorySink>,
    pub v1: Revision,
    pub v2: Revision,
}

impl Harness {
    pub fn new(replicas: u32) -> Self {
        init_tracing();
        let backend = Arc::new(SimulatedBackend::new());
        let v1 = revision("v1", replicas);
        let v2 = revision("v2", replicas);
        backend.seed(&v1, replicas);
        Self {
            backend,
            events: Arc::new(MemorySink::new()),
            v1,
            v2,
        }
    }

    /// Start a rollout from v1 to v2.
    pub async fn start(
        &self,
        settings: RolloutSettings,
        probe: impl ProbeTarget + 'static,
    ) -> RolloutController {
        RolloutController::start(
            settings,
            self.v2.clone(),
            self.backend.clone(),
            Arc::new(probe),
            self.events.clone() as Arc<dyn EventSink>,
        )
        .await
        .expect("rollout should start")
    }

    pub async fn start_healthy(&self, settings: RolloutSettings) -> RolloutController {
        self.start(settings, ScriptedProbe::healthy()).await
    }

    pub fn running(&self, revision: &Revision) -> usize {
        self.backend.instances_of(&revision.id).len()
    }

    /// Backend calls as ("+"|"-", revision) pairs.
    pub fn churn(&self) -> Vec<(&'static str, String)> {
        self.backend
            .history()
            .into_iter()
            .map(|call| match call {
                BackendCall::Created { revision, .. } => ("+", revision.to_string()),
                BackendCall::Destroyed { revision, .. } => ("-", revision.to_string()),
            })
            .collect()
    }
}
