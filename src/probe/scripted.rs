// ABOUTME: Closure-driven probe target for simulation and tests.
// ABOUTME: Decides each outcome from the instance and probe kind, optionally after a delay.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::{ProbeKind, ProbeOutcome, ProbeTarget};
use crate::config::ProbeConfig;
use crate::types::Instance;

type Script = dyn Fn(&Instance, ProbeKind) -> ProbeOutcome + Send + Sync;

#[derive(Clone)]
pub struct ScriptedProbe {
    script: Arc<Script>,
    delay: Duration,
}

impl ScriptedProbe {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Instance, ProbeKind) -> ProbeOutcome + Send + Sync + 'static,
    {
        Self {
            script: Arc::new(script),
            delay: Duration::ZERO,
        }
    }

    /// Every check succeeds.
    pub fn healthy() -> Self {
        Self::new(|_, _| ProbeOutcome::Success)
    }

    /// Answer only after `delay`, to exercise probe timeouts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl fmt::Debug for ScriptedProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProbe")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProbeTarget for ScriptedProbe {
    async fn check(
        &self,
        instance: &Instance,
        kind: ProbeKind,
        _config: &ProbeConfig,
    ) -> ProbeOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.script)(instance, kind)
    }
}
