// ABOUTME: Configuration types and parsing for rollwatch.yml.
// ABOUTME: Handles YAML parsing, env-sourced values, validation, and destination overrides.

mod probe;
mod rollout;
mod value;

pub use probe::{ProbeConfig, ProbesConfig};
pub use rollout::{BackendConfig, BackendKind, DisruptionConfig, RolloutConfig};
pub use value::ValueSource;

use crate::budget::{self, Budgets};
use crate::error::{Error, Result};
use crate::types::{Revision, RevisionId, ServiceName};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

pub const CONFIG_FILENAME: &str = "rollwatch.yml";
pub const CONFIG_FILENAME_ALT: &str = "rollwatch.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".rollwatch/config.yml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceName,

    pub revision: ValueSource,

    pub image: ValueSource,

    #[serde(default = "default_replicas")]
    pub replicas: u32,

    #[serde(default)]
    pub rollout: RolloutConfig,

    #[serde(default)]
    pub probes: ProbesConfig,

    #[serde(default)]
    pub disruption: DisruptionConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub destinations: HashMap<String, Destination>,
}

/// Per-environment overrides, e.g. fewer replicas on staging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Destination {
    #[serde(default)]
    pub replicas: Option<u32>,

    #[serde(default)]
    pub rollout: Option<RolloutConfig>,

    #[serde(default)]
    pub probes: Option<ProbesConfig>,

    #[serde(default)]
    pub disruption: Option<DisruptionConfig>,

    #[serde(default)]
    pub backend: Option<BackendConfig>,
}

fn default_replicas() -> u32 {
    1
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                tracing::debug!("loading config from {}", path.display());
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    pub fn for_destination(&self, name: &str) -> Result<Config> {
        let dest = self
            .destinations
            .get(name)
            .ok_or_else(|| Error::UnknownDestination(name.to_string()))?;

        let mut merged = self.clone();

        if let Some(replicas) = dest.replicas {
            merged.replicas = replicas;
        }
        if let Some(ref rollout) = dest.rollout {
            merged.rollout = rollout.clone();
        }
        if let Some(ref probes) = dest.probes {
            merged.probes = probes.clone();
        }
        if let Some(ref disruption) = dest.disruption {
            merged.disruption = disruption.clone();
        }
        if let Some(ref backend) = dest.backend {
            merged.backend = backend.clone();
        }

        Ok(merged)
    }

    /// Check everything serde cannot express on its own.
    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig("replicas must be at least 1".into()));
        }

        self.budgets().map_err(Error::InvalidConfig)?;

        let threshold = self.rollout.error_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "rollout.error_threshold must be in (0, 1], got {}",
                threshold
            )));
        }

        if self.rollout.tick.is_zero() {
            return Err(Error::InvalidConfig("rollout.tick must be positive".into()));
        }

        for (name, probe) in [
            ("liveness", &self.probes.liveness),
            ("readiness", &self.probes.readiness),
        ] {
            if probe.failure_threshold == 0 {
                return Err(Error::InvalidConfig(format!(
                    "probes.{name}.failure_threshold must be at least 1"
                )));
            }
            if probe.interval.is_zero() || probe.timeout.is_zero() {
                return Err(Error::InvalidConfig(format!(
                    "probes.{name} interval and timeout must be positive"
                )));
            }
        }

        if self.backend.call_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "backend.call_timeout must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Resolve surge, unavailable, and minimum-available against `replicas`.
    pub fn budgets(&self) -> std::result::Result<Budgets, String> {
        budget::resolve_budgets(
            self.replicas,
            self.rollout.max_surge,
            self.rollout.max_unavailable,
            self.disruption.min_available,
        )
    }

    pub fn revision_id(&self) -> Result<RevisionId> {
        let raw = self.revision.resolve()?;
        RevisionId::parse(&raw).map_err(Error::InvalidConfig)
    }

    /// Build the target revision from the resolved revision id and image.
    pub fn target_revision(&self) -> Result<Revision> {
        let image = self.image.resolve()?;
        if image.trim().is_empty() {
            return Err(Error::InvalidConfig("image cannot be empty".into()));
        }
        Ok(Revision::new(
            self.service.clone(),
            self.revision_id()?,
            image,
            self.replicas,
        ))
    }

    pub fn template(service: ServiceName) -> Self {
        Config {
            service,
            revision: ValueSource::Env {
                env: "ROLLWATCH_REVISION".to_string(),
                default: Some("dev".to_string()),
            },
            image: ValueSource::from("registry.example.com/enrichment-api:latest"),
            replicas: 2,
            rollout: RolloutConfig::default(),
            probes: ProbesConfig::default(),
            disruption: DisruptionConfig::default(),
            backend: BackendConfig::default(),
            destinations: HashMap::new(),
        }
    }
}

pub fn init_config(
    dir: &Path,
    service: Option<&str>,
    image: Option<&str>,
    force: bool,
) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let service = ServiceName::new(service.unwrap_or("enrichment-api"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let mut config = Config::template(service);

    if let Some(i) = image {
        config.image = ValueSource::from(i);
    }

    std::fs::write(&config_path, generate_template_yaml(&config))?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let image = match &config.image {
        ValueSource::Literal(image) => image.clone(),
        ValueSource::Env { env, .. } => format!("{{ env: {env} }}"),
    };
    format!(
        r#"service: {service}
revision: {{ env: ROLLWATCH_REVISION, default: dev }}
image: {image}
replicas: {replicas}

rollout:
  max_surge: 1
  max_unavailable: 0
  progress_deadline: 10m
  observation_window: 5m
  error_threshold: 0.5

probes:
  liveness:
    path: /healthz
    port: 8080
    interval: 10s
    failure_threshold: 3
  readiness:
    path: /healthz
    port: 8080
    interval: 10s
    failure_threshold: 3
"#,
        service = config.service,
        image = image,
        replicas = config.replicas,
    )
}
