// ABOUTME: Config values that are either written inline or read from the environment.
// ABOUTME: Lets a build pipeline inject the revision id and image at rollout time.

use crate::error::{Error, Result};
use serde::Deserialize;

/// A string config value, inline or taken from an environment variable.
///
/// ```yaml
/// revision: 3f9c2ab
/// revision: { env: GITHUB_SHA, default: dev }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ValueSource {
    Literal(String),
    Env {
        env: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl ValueSource {
    pub fn resolve(&self) -> Result<String> {
        match self {
            ValueSource::Literal(value) => Ok(value.clone()),
            ValueSource::Env { env, default } => std::env::var(env)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(env.clone())),
        }
    }
}

impl From<&str> for ValueSource {
    fn from(value: &str) -> Self {
        ValueSource::Literal(value.to_string())
    }
}
