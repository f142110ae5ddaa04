// ABOUTME: Validate command implementation.
// ABOUTME: Loads the config, checks it, and prints the resolved revision and budgets.

use rollwatch::config::Config;
use rollwatch::error::{Error, Result};
use rollwatch::output::Output;

pub fn validate(config: &Config, output: &Output) -> Result<()> {
    config.validate()?;
    let target = config.target_revision()?;
    let budgets = config.budgets().map_err(Error::InvalidConfig)?;

    output.progress(&format!("Service:       {}", target.service));
    output.progress(&format!("Revision:      {}", target.id));
    output.progress(&format!("Image:         {}", target.image));
    output.progress(&format!("Replicas:      {}", target.replicas));
    output.progress(&format!("Max surge:     {}", budgets.surge));
    output.progress(&format!("Unavailable:   {}", budgets.unavailable));
    output.progress(&format!("Min available: {}", budgets.min_available));

    output.success("Configuration is valid");
    Ok(())
}
