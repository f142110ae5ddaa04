// ABOUTME: Rollout control: state machine, fleet tracking, rollback trigger, and operator commands.
// ABOUTME: One controller per revision transition; independent rollouts share no state.

mod command;
mod context;
mod controller;
mod error;
mod fleet;
mod handle;
mod lock;
mod retry;
mod state;
mod trigger;

pub use command::Command;
pub use context::{Counters, RolloutContext, RolloutSnapshot};
pub use controller::{CommandOutcome, RolloutController, RolloutSettings};
pub use error::{RolloutError, RolloutErrorKind};
pub use fleet::{Fleet, FleetCounts, InstanceRecord, Role};
pub use handle::{RolloutCommander, RolloutHandle};
pub use lock::{LockInfo, RolloutLock, state_dir};
pub use retry::{RetryPolicy, retry_call, with_timeout};
pub use state::{AbortReason, RolloutState, RolloutStatus};
pub use trigger::{RollbackTrigger, TriggerSettings};
