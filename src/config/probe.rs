// ABOUTME: Liveness and readiness probe configuration.
// ABOUTME: HTTP path/port plus polling cadence and failure threshold.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Consecutive failures before the instance is considered unhealthy.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    #[serde(default, with = "humantime_serde")]
    pub initial_delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            port: default_port(),
            interval: default_interval(),
            timeout: default_timeout(),
            failure_threshold: default_failure_threshold(),
            initial_delay: Duration::ZERO,
        }
    }
}

/// The two probes every instance is checked with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProbesConfig {
    #[serde(default)]
    pub liveness: ProbeConfig,

    #[serde(default)]
    pub readiness: ProbeConfig,
}

fn default_path() -> String {
    "/healthz".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_failure_threshold() -> u32 {
    3
}
