// ABOUTME: Library root for rollwatch - exposes the rollout engine for the CLI and tests.
// ABOUTME: The main binary is in main.rs.

pub mod backend;
pub mod budget;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod hooks;
pub mod output;
pub mod probe;
pub mod rollout;
pub mod types;
