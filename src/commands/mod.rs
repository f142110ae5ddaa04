// ABOUTME: Command module aggregator for the rollwatch CLI.
// ABOUTME: Re-exports the rollout and validate command handlers.

mod backend_connection;
mod rollout;
mod validate;

pub use rollout::{RolloutOptions, rollout};
pub use validate::validate;
