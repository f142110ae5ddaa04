// ABOUTME: Out-of-band operator commands for a running rollout.
// ABOUTME: Parsed from CLI-style strings; validated by the controller before any state change.

use std::fmt;
use std::str::FromStr;

use crate::types::{InstanceId, Quantity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    /// Roll back to the baseline.
    Cancel,
    SetSurge(Quantity),
    SetUnavailable(Quantity),
    /// Voluntarily remove one instance, subject to the disruption budget.
    Evict(InstanceId),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Pause => "pause",
            Command::Resume => "resume",
            Command::Cancel => "cancel",
            Command::SetSurge(_) => "set-surge",
            Command::SetUnavailable(_) => "set-unavailable",
            Command::Evict(_) => "evict",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetSurge(q) | Command::SetUnavailable(q) => write!(f, "{} {}", self.name(), q),
            Command::Evict(id) => write!(f, "evict {id}"),
            _ => f.write_str(self.name()),
        }
    }
}

impl FromStr for Command {
    type Err = String;

    /// `pause`, `resume`, `cancel`, `set-surge 2`, `set-unavailable 25%`, `evict <id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments for '{verb}'"));
        }

        let quantity = |arg: Option<&str>| -> Result<Quantity, String> {
            arg.ok_or_else(|| format!("'{verb}' needs a value"))?
                .parse::<Quantity>()
                .map_err(|e| e.to_string())
        };

        let command = match verb {
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "cancel" => Command::Cancel,
            "set-surge" => Command::SetSurge(quantity(arg)?),
            "set-unavailable" => Command::SetUnavailable(quantity(arg)?),
            "evict" => Command::Evict(InstanceId::new(
                arg.ok_or_else(|| "'evict' needs an instance id".to_string())?,
            )),
            other => return Err(format!("unknown command '{other}'")),
        };

        if arg.is_some() && matches!(command, Command::Pause | Command::Resume | Command::Cancel) {
            return Err(format!("'{verb}' takes no arguments"));
        }
        Ok(command)
    }
}
