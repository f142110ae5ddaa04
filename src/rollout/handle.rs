// ABOUTME: Runs a controller on its own task and exposes it to operators.
// ABOUTME: Commands are queued to the control loop; snapshots come back through a watch channel.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::command::Command;
use super::context::RolloutSnapshot;
use super::controller::{CommandOutcome, RolloutController};
use super::error::RolloutError;
use crate::types::{InstanceId, Quantity};

struct Request {
    command: Command,
    reply: oneshot::Sender<Result<CommandOutcome, RolloutError>>,
}

impl RolloutController {
    /// Run the control loop on a new task until the rollout finishes.
    pub fn spawn(self) -> RolloutHandle {
        let (tx, rx) = mpsc::channel(16);
        let commander = RolloutCommander {
            commands: tx,
            snapshots: self.subscribe(),
        };
        let task = tokio::spawn(self.run(rx));
        RolloutHandle { commander, task }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Request>) -> RolloutSnapshot {
        let mut ticker = tokio::time::interval(self.settings().tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !self.status().is_terminal() {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                Some(request) = commands.recv() => {
                    let result = self.apply(request.command).await;
                    let _ = request.reply.send(result);
                }
            }
        }

        // Commands that raced the finish still get an answer.
        commands.close();
        while let Some(request) = commands.recv().await {
            let result = self.apply(request.command).await;
            let _ = request.reply.send(result);
        }

        self.snapshot()
    }
}

/// Cloneable command channel to a running rollout.
#[derive(Clone)]
pub struct RolloutCommander {
    commands: mpsc::Sender<Request>,
    snapshots: watch::Receiver<RolloutSnapshot>,
}

impl RolloutCommander {
    pub async fn send(&self, command: Command) -> Result<CommandOutcome, RolloutError> {
        let (reply, response) = oneshot::channel();
        let request = Request {
            command: command.clone(),
            reply,
        };
        if self.commands.send(request).await.is_err() {
            return self.after_finish(&command);
        }
        match response.await {
            Ok(result) => result,
            Err(_) => self.after_finish(&command),
        }
    }

    /// The loop is gone: a finished rollout still accepts a (no-op) cancel.
    fn after_finish(&self, command: &Command) -> Result<CommandOutcome, RolloutError> {
        let status = self.snapshots.borrow().state.status;
        match (status.is_terminal(), command) {
            (true, Command::Cancel) => Ok(CommandOutcome::Unchanged),
            (true, _) => Err(RolloutError::Finished(status)),
            (false, _) => Err(RolloutError::Stopped),
        }
    }

    pub async fn pause(&self) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::Resume).await
    }

    pub async fn cancel(&self) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::Cancel).await
    }

    pub async fn set_surge(&self, surge: Quantity) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::SetSurge(surge)).await
    }

    pub async fn set_unavailable(
        &self,
        unavailable: Quantity,
    ) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::SetUnavailable(unavailable)).await
    }

    pub async fn evict(&self, instance: InstanceId) -> Result<CommandOutcome, RolloutError> {
        self.send(Command::Evict(instance)).await
    }

    pub fn snapshot(&self) -> RolloutSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RolloutSnapshot> {
        self.snapshots.clone()
    }
}

/// Owner of a spawned rollout.
pub struct RolloutHandle {
    commander: RolloutCommander,
    task: JoinHandle<RolloutSnapshot>,
}

impl RolloutHandle {
    pub fn commander(&self) -> RolloutCommander {
        self.commander.clone()
    }

    pub async fn send(&self, command: Command) -> Result<CommandOutcome, RolloutError> {
        self.commander.send(command).await
    }

    pub async fn pause(&self) -> Result<CommandOutcome, RolloutError> {
        self.commander.pause().await
    }

    pub async fn resume(&self) -> Result<CommandOutcome, RolloutError> {
        self.commander.resume().await
    }

    pub async fn cancel(&self) -> Result<CommandOutcome, RolloutError> {
        self.commander.cancel().await
    }

    pub async fn set_surge(&self, surge: Quantity) -> Result<CommandOutcome, RolloutError> {
        self.commander.set_surge(surge).await
    }

    pub async fn set_unavailable(
        &self,
        unavailable: Quantity,
    ) -> Result<CommandOutcome, RolloutError> {
        self.commander.set_unavailable(unavailable).await
    }

    pub async fn evict(&self, instance: InstanceId) -> Result<CommandOutcome, RolloutError> {
        self.commander.evict(instance).await
    }

    pub fn snapshot(&self) -> RolloutSnapshot {
        self.commander.snapshot()
    }

    /// Wait for the rollout to reach Succeeded or Aborted.
    pub async fn wait(self) -> Result<RolloutSnapshot, RolloutError> {
        self.task.await.map_err(|e| {
            tracing::error!(error = %e, "rollout task failed");
            RolloutError::Stopped
        })
    }
}
