// ABOUTME: Hooks system for rollout lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-rollout, post-rollout, and on-abort points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::rollout::AbortReason;
use crate::types::{Revision, RevisionId, ServiceName};

/// Hook execution points in the rollout lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before any instance is touched. Failure stops the rollout.
    PreRollout,
    /// After the rollout succeeded. Failure logs a warning.
    PostRollout,
    /// After a rollback finished. Failure logs a warning.
    OnAbort,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreRollout => "pre-rollout",
            HookPoint::PostRollout => "post-rollout",
            HookPoint::OnAbort => "on-abort",
        }
    }

    /// Whether failure at this hook point should stop the rollout.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreRollout)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub service: ServiceName,
    pub revision: RevisionId,
    pub image: String,
    pub previous_revision: Option<RevisionId>,
    pub abort_reason: Option<AbortReason>,
}

impl HookContext {
    pub fn new(target: &Revision, previous_revision: Option<RevisionId>) -> Self {
        Self {
            service: target.service.clone(),
            revision: target.id.clone(),
            image: target.image.clone(),
            previous_revision,
            abort_reason: None,
        }
    }

    pub fn with_abort_reason(mut self, reason: AbortReason) -> Self {
        self.abort_reason = Some(reason);
        self
    }

    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("ROLLWATCH_SERVICE".to_string(), self.service.to_string());
        env.insert("ROLLWATCH_REVISION".to_string(), self.revision.to_string());
        env.insert("ROLLWATCH_IMAGE".to_string(), self.image.clone());
        if let Some(ref prev) = self.previous_revision {
            env.insert("ROLLWATCH_PREVIOUS_REVISION".to_string(), prev.to_string());
        }
        if let Some(reason) = self.abort_reason {
            env.insert("ROLLWATCH_ABORT_REASON".to_string(), reason.to_string());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a project directory.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Look for hooks in `<project_dir>/.rollwatch/hooks`.
    pub fn new(project_dir: &Path) -> Self {
        Self {
            hooks_dir: project_dir.join(".rollwatch").join("hooks"),
        }
    }

    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let output = Command::new(&hook_path)
            .envs(context.to_env())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let result = match output {
            Ok(output) => HookResult {
                success: output.status.success(),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                return Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                });
            }
        };

        if result.success {
            tracing::info!("{} hook completed successfully", point.filename());
        } else {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                point.filename(),
                result.exit_code
            );
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> HookContext {
        HookContext {
            service: ServiceName::new("enrichment-api").unwrap(),
            revision: RevisionId::new("3f2c1ab"),
            image: "registry.example.com/enrichment-api:3f2c1ab".to_string(),
            previous_revision: Some(RevisionId::new("9e8d7c6")),
            abort_reason: None,
        }
    }

    #[test]
    fn hook_point_filenames() {
        assert_eq!(HookPoint::PreRollout.filename(), "pre-rollout");
        assert_eq!(HookPoint::PostRollout.filename(), "post-rollout");
        assert_eq!(HookPoint::OnAbort.filename(), "on-abort");
    }

    #[test]
    fn only_pre_rollout_is_fatal() {
        assert!(HookPoint::PreRollout.is_fatal());
        assert!(!HookPoint::PostRollout.is_fatal());
        assert!(!HookPoint::OnAbort.is_fatal());
    }

    #[test]
    fn hook_context_to_env() {
        let env = context().to_env();
        assert_eq!(
            env.get("ROLLWATCH_SERVICE").map(String::as_str),
            Some("enrichment-api")
        );
        assert_eq!(env.get("ROLLWATCH_REVISION").map(String::as_str), Some("3f2c1ab"));
        assert_eq!(
            env.get("ROLLWATCH_IMAGE").map(String::as_str),
            Some("registry.example.com/enrichment-api:3f2c1ab")
        );
        assert_eq!(
            env.get("ROLLWATCH_PREVIOUS_REVISION").map(String::as_str),
            Some("9e8d7c6")
        );
        assert!(!env.contains_key("ROLLWATCH_ABORT_REASON"));
    }

    #[test]
    fn abort_reason_is_exported_on_abort() {
        let env = context()
            .with_abort_reason(AbortReason::ErrorRate)
            .to_env();
        assert_eq!(
            env.get("ROLLWATCH_ABORT_REASON").map(String::as_str),
            Some("error-rate")
        );
    }

    #[test]
    fn first_rollout_has_no_previous_revision() {
        let mut ctx = context();
        ctx.previous_revision = None;
        assert!(!ctx.to_env().contains_key("ROLLWATCH_PREVIOUS_REVISION"));
    }

    #[test]
    fn hook_runner_checks_hooks_dir() {
        let runner = HookRunner::new(Path::new("/nonexistent"));
        assert!(!runner.hook_exists(HookPoint::PreRollout));
    }
}
