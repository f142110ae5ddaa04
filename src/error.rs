// ABOUTME: Application-wide error types for rollwatch.
// ABOUTME: Uses thiserror; module errors convert in with `?`.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;
use crate::rollout::{AbortReason, RolloutError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("rollout aborted ({0}); previous revision restored")]
    Aborted(AbortReason),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
