// ABOUTME: Entry point for the rollwatch CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use rollwatch::config::{self, Config};
use rollwatch::error::Result;
use rollwatch::output::{Output, OutputMode};
use std::env;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };

    // Exit explicitly: a pending stdin read would otherwise hold up runtime shutdown.
    let code = match run(cli, mode).await {
        Ok(()) => 0,
        Err(e) => {
            Output::new(mode).error(&e.to_string());
            1
        }
    };
    std::process::exit(code);
}

async fn run(cli: Cli, mode: OutputMode) -> Result<()> {
    let output = Output::new(mode);
    match cli.command {
        Commands::Init {
            service,
            image,
            force,
        } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, service.as_deref(), image.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Validate { destination } => {
            let config = load_config(destination.as_deref())?;
            commands::validate(&config, &output)
        }
        Commands::Rollout {
            destination,
            revision,
            replicas,
            simulate,
            force,
        } => {
            let mut config = load_config(destination.as_deref())?;
            if let Some(revision) = revision {
                config.revision = config::ValueSource::from(revision.as_str());
            }
            if let Some(replicas) = replicas {
                config.replicas = replicas;
            }
            let options = commands::RolloutOptions { simulate, force };
            commands::rollout(config, options, output).await
        }
    }
}

/// Discover the config in the working directory and apply destination overrides.
fn load_config(destination: Option<&str>) -> Result<Config> {
    let cwd = env::current_dir()?;
    let config = Config::discover(&cwd)?;
    match destination {
        Some(dest) => config.for_destination(dest),
        None => Ok(config),
    }
}
