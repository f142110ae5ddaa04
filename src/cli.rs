// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollwatch")]
#[command(about = "Health-gated rolling updates with automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print events as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new rollwatch.yml configuration file
    Init {
        /// Service name
        #[arg(long)]
        service: Option<String>,

        /// Image the service runs
        #[arg(long)]
        image: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and print the resolved budgets
    Validate {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,
    },

    /// Roll the service out to a new revision
    Rollout {
        /// Target destination (defined in config)
        #[arg(short, long)]
        destination: Option<String>,

        /// Revision id to roll out (overrides the configured source)
        #[arg(long)]
        revision: Option<String>,

        /// Desired replica count (overrides the config)
        #[arg(long)]
        replicas: Option<u32>,

        /// Run against an in-process backend with always-healthy probes
        #[arg(long)]
        simulate: bool,

        /// Break an existing rollout lock
        #[arg(long)]
        force: bool,
    },
}
