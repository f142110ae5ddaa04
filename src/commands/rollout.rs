// ABOUTME: Rollout command implementation.
// ABOUTME: Handles the rollout lock, hooks, operator input, and running the controller.

use super::backend_connection::{connect_backend, probe_for};
use rollwatch::config::{BackendKind, Config};
use rollwatch::diagnostics::{Diagnostics, Warning};
use rollwatch::error::{Error, Result};
use rollwatch::events::{EventSink, Fanout, TracingSink};
use rollwatch::hooks::{HookContext, HookPoint, HookRunner};
use rollwatch::output::Output;
use rollwatch::rollout::{
    AbortReason, Command, CommandOutcome, RolloutCommander, RolloutController, RolloutLock,
    RolloutSettings, RolloutSnapshot, RolloutStatus,
};
use rollwatch::types::Revision;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default)]
pub struct RolloutOptions {
    /// Force the in-process backend regardless of config.
    pub simulate: bool,
    /// Break an existing rollout lock.
    pub force: bool,
}

/// Roll the configured service out to its target revision.
pub async fn rollout(mut config: Config, options: RolloutOptions, mut output: Output) -> Result<()> {
    if options.simulate {
        config.backend.kind = BackendKind::Simulated;
    }
    config.validate()?;
    let target = config.target_revision()?;

    output.start_timer();
    let output = Arc::new(output);
    let cwd = env::current_dir()?;
    let hook_runner = HookRunner::new(&cwd);
    let mut diag = Diagnostics::default();

    output.progress("  → Acquiring rollout lock...");
    let lock = RolloutLock::acquire(&target.service, &target.id, options.force)?;

    let result = rollout_locked(&config, &target, &hook_runner, &output, &mut diag).await;

    if let Err(e) = lock.release() {
        diag.warn(Warning::lock_release(format!(
            "failed to release rollout lock: {}",
            e
        )));
    }

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let snapshot = result?;
    match snapshot.state.status {
        RolloutStatus::Succeeded => {
            output.success(&format!(
                "Rolled out {} {} to {} instance(s)",
                target.service, target.id, target.replicas
            ));
            Ok(())
        }
        _ => Err(Error::Aborted(
            snapshot.state.abort_reason.unwrap_or(AbortReason::Manual),
        )),
    }
}

/// Everything that happens while the lock is held.
async fn rollout_locked(
    config: &Config,
    target: &Revision,
    hook_runner: &HookRunner,
    output: &Arc<Output>,
    diag: &mut Diagnostics,
) -> Result<RolloutSnapshot> {
    let backend = connect_backend(config, target, output)?;
    let sink: Arc<dyn EventSink> = Arc::new(Fanout(vec![
        Arc::new(TracingSink),
        output.clone() as Arc<dyn EventSink>,
    ]));

    let controller = RolloutController::start(
        RolloutSettings::from_config(config),
        target.clone(),
        backend,
        probe_for(config),
        sink,
    )
    .await?;

    // Nothing has been created or removed yet, so a failed pre-rollout hook
    // just drops the controller.
    let previous = controller.context().baseline.as_ref().map(|b| b.id.clone());
    let hook_context = HookContext::new(target, previous);
    if let Some(result) = hook_runner.run(HookPoint::PreRollout, &hook_context).await
        && !result.success
    {
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr);
        }
        return Err(Error::Hook("pre-rollout hook failed".to_string()));
    }

    let handle = controller.spawn();
    let interrupt = spawn_interrupt(handle.commander());
    let operator = spawn_operator_input(handle.commander(), output.clone());

    let snapshot = handle.wait().await?;
    interrupt.abort();
    operator.abort();

    match snapshot.state.status {
        RolloutStatus::Succeeded => {
            if let Some(result) = hook_runner.run(HookPoint::PostRollout, &hook_context).await
                && !result.success
            {
                diag.warn(Warning::hook_failed(format!(
                    "post-rollout hook failed with exit code {:?}",
                    result.exit_code
                )));
            }
        }
        _ => {
            if snapshot.leftovers > 0 {
                diag.warn(Warning::cleanup_leftovers(format!(
                    "rollback left {} instance(s) that need manual cleanup",
                    snapshot.leftovers
                )));
            }
            let reason = snapshot.state.abort_reason.unwrap_or(AbortReason::Manual);
            let abort_context = hook_context.clone().with_abort_reason(reason);
            if let Some(result) = hook_runner.run(HookPoint::OnAbort, &abort_context).await
                && !result.success
            {
                diag.warn(Warning::hook_failed(format!(
                    "on-abort hook failed with exit code {:?}",
                    result.exit_code
                )));
            }
        }
    }

    Ok(snapshot)
}

/// Ctrl-C cancels the rollout, which rolls back.
fn spawn_interrupt(commander: RolloutCommander) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling rollout");
            if let Err(e) = commander.cancel().await {
                tracing::debug!(error = %e, "cancel after interrupt");
            }
        }
    })
}

/// Read operator commands (`pause`, `set-surge 2`, ...) from stdin, one per line.
fn spawn_operator_input(commander: RolloutCommander, output: Arc<Output>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    output.warning(&e.to_string());
                    continue;
                }
            };
            match commander.send(command.clone()).await {
                Ok(outcome) => output.progress(&format!(
                    "  → {}: {}",
                    command,
                    describe_outcome(outcome)
                )),
                Err(e) => output.warning(&format!("{}: {}", command, e)),
            }
        }
    })
}

fn describe_outcome(outcome: CommandOutcome) -> &'static str {
    match outcome {
        CommandOutcome::Applied => "applied",
        CommandOutcome::Unchanged => "no change",
        CommandOutcome::Evicted => "evicted",
        CommandOutcome::Refused => "refused by disruption budget",
    }
}
