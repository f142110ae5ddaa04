// ABOUTME: In-process instance backend for tests and dry runs.
// ABOUTME: Scriptable stalls, failures, list lag, and external kills.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use parking_lot::Mutex;

use super::{BackendError, InstanceBackend};
use crate::types::{Instance, InstanceId, Revision, RevisionId, ServiceName};

/// A mutating call the backend accepted, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Created { revision: RevisionId, instance: InstanceId },
    Destroyed { revision: RevisionId, instance: InstanceId },
}

struct SimInstance {
    service: ServiceName,
    instance: Instance,
    /// Remaining `list` calls that will not report this instance yet.
    hidden_for: u32,
}

#[derive(Default)]
struct SimState {
    instances: Vec<SimInstance>,
    next_id: u64,
    stalled_creates: u32,
    failing_creates: u32,
    failing_destroys: u32,
    list_lag: u32,
    history: Vec<BackendCall>,
}

/// Backend that keeps instances in memory.
#[derive(Default)]
pub struct SimulatedBackend {
    state: Mutex<SimState>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `count` instances of `revision` are already running.
    pub fn seed(&self, revision: &Revision, count: u32) -> Vec<Instance> {
        let mut state = self.state.lock();
        (0..count).map(|_| state.spawn(revision, 0)).collect()
    }

    /// The next `n` creates never complete (the caller's timeout fires).
    pub fn stall_creates(&self, n: u32) {
        self.state.lock().stalled_creates = n;
    }

    /// The next `n` creates fail immediately.
    pub fn fail_creates(&self, n: u32) {
        self.state.lock().failing_creates = n;
    }

    /// The next `n` destroys fail immediately.
    pub fn fail_destroys(&self, n: u32) {
        self.state.lock().failing_destroys = n;
    }

    /// New instances stay invisible to `list` for this many calls.
    pub fn set_list_lag(&self, calls: u32) {
        self.state.lock().list_lag = calls;
    }

    /// Remove an instance behind the controller's back.
    pub fn kill(&self, id: &InstanceId) -> bool {
        let mut state = self.state.lock();
        let before = state.instances.len();
        state.instances.retain(|s| &s.instance.id != id);
        state.instances.len() != before
    }

    /// Instances of a revision, ignoring list lag.
    pub fn instances_of(&self, revision: &RevisionId) -> Vec<Instance> {
        self.state
            .lock()
            .instances
            .iter()
            .filter(|s| &s.instance.revision == revision)
            .map(|s| s.instance.clone())
            .collect()
    }

    pub fn history(&self) -> Vec<BackendCall> {
        self.state.lock().history.clone()
    }
}

impl SimState {
    fn spawn(&mut self, revision: &Revision, hidden_for: u32) -> Instance {
        self.next_id += 1;
        let seq = self.next_id;
        // Strictly increasing creation times keep "oldest first" deterministic.
        let created_at = Utc::now() + ChronoDuration::milliseconds(seq as i64);
        let instance = Instance {
            id: InstanceId::new(format!("sim-{seq}")),
            revision: revision.id.clone(),
            image: revision.image.clone(),
            created_at,
            endpoint: None,
        };
        self.instances.push(SimInstance {
            service: revision.service.clone(),
            instance: instance.clone(),
            hidden_for,
        });
        instance
    }
}

#[async_trait]
impl InstanceBackend for SimulatedBackend {
    async fn create(&self, revision: &Revision) -> Result<Instance, BackendError> {
        let stalled = {
            let mut state = self.state.lock();
            if state.failing_creates > 0 {
                state.failing_creates -= 1;
                return Err(BackendError::unavailable("simulated create failure"));
            }
            if state.stalled_creates > 0 {
                state.stalled_creates -= 1;
                true
            } else {
                false
            }
        };

        if stalled {
            std::future::pending::<()>().await;
        }

        let mut state = self.state.lock();
        let lag = state.list_lag;
        let instance = state.spawn(revision, lag);
        state.history.push(BackendCall::Created {
            revision: revision.id.clone(),
            instance: instance.id.clone(),
        });
        tracing::debug!(instance = %instance.id, revision = %revision.id, "simulated create");
        Ok(instance)
    }

    async fn destroy(&self, instance: &Instance) -> Result<(), BackendError> {
        let mut state = self.state.lock();
        if state.failing_destroys > 0 {
            state.failing_destroys -= 1;
            return Err(BackendError::unavailable("simulated destroy failure"));
        }
        let before = state.instances.len();
        state.instances.retain(|s| s.instance.id != instance.id);
        if state.instances.len() != before {
            state.history.push(BackendCall::Destroyed {
                revision: instance.revision.clone(),
                instance: instance.id.clone(),
            });
        }
        Ok(())
    }

    async fn list(&self, revision: &Revision) -> Result<Vec<Instance>, BackendError> {
        let mut state = self.state.lock();
        let mut visible = Vec::new();
        for sim in state
            .instances
            .iter_mut()
            .filter(|s| s.service == revision.service && s.instance.revision == revision.id)
        {
            if sim.hidden_for > 0 {
                sim.hidden_for -= 1;
            } else {
                visible.push(sim.instance.clone());
            }
        }
        Ok(visible)
    }

    async fn list_service(&self, service: &ServiceName) -> Result<Vec<Instance>, BackendError> {
        Ok(self
            .state
            .lock()
            .instances
            .iter()
            .filter(|s| &s.service == service)
            .map(|s| s.instance.clone())
            .collect())
    }
}
