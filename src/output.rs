// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, and renders rollout events.

use serde::Serialize;
use std::time::Instant;

use crate::events::{EventSink, RolloutEvent};

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    /// Start timing an operation.
    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Get elapsed time since timer started.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a warning. Shown in every mode; JSON mode emits a warning event.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "warning",
                    message,
                    duration_secs: None,
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => {
                let elapsed = self.elapsed_secs();
                if elapsed > 0.0 {
                    println!("{message} ({:.1}s)", elapsed);
                } else {
                    println!("{message}");
                }
            }
            OutputMode::Quiet => {
                println!("{message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    println!("{json}");
                }
            }
        }
    }

    /// Print an error message.
    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => {
                eprintln!("Error: {message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a rollout event: a progress line, nothing, or a JSON line.
    pub fn event(&self, event: &RolloutEvent) {
        match self.mode {
            OutputMode::Normal => println!("{}", describe(event)),
            OutputMode::Quiet => {}
            OutputMode::Json => {
                if let Ok(json) = serde_json::to_string(event) {
                    println!("{json}");
                }
            }
        }
    }
}

impl EventSink for Output {
    fn emit(&self, event: &RolloutEvent) {
        self.event(event);
    }
}

/// One human-readable line per event.
pub fn describe(event: &RolloutEvent) -> String {
    match event {
        RolloutEvent::RolloutStarted {
            service,
            from,
            to,
            replicas,
            surge,
            unavailable,
        } => {
            let from = from
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "nothing".to_string());
            format!(
                "Rolling out {service}: {from} → {to} ({replicas} replicas, surge {surge}, unavailable {unavailable})"
            )
        }
        RolloutEvent::InstanceCreated { instance, revision } => {
            format!("  → Created {instance} ({revision})")
        }
        RolloutEvent::InstanceRemoved {
            instance,
            revision,
            cause,
        } => format!("  → Removed {instance} ({revision}, {cause})"),
        RolloutEvent::InstanceHealthChanged {
            instance, from, to, ..
        } => format!("  → {instance}: {from} → {to}"),
        RolloutEvent::RolloutPaused => "  ‖ Paused".to_string(),
        RolloutEvent::RolloutResumed => "  → Resumed".to_string(),
        RolloutEvent::BudgetChanged {
            surge,
            unavailable,
            min_available,
        } => format!(
            "  → Budget: surge {surge}, unavailable {unavailable}, min available {min_available}"
        ),
        RolloutEvent::RolloutAborted {
            reason,
            restored,
            leftovers,
        } => {
            if *leftovers > 0 {
                format!(
                    "  ✗ Aborted ({reason}): {restored} previous instance(s) serving, {leftovers} left over"
                )
            } else {
                format!("  ✗ Aborted ({reason}): {restored} previous instance(s) serving")
            }
        }
        RolloutEvent::RolloutSucceeded { revision, replicas } => {
            format!("  ✓ {revision} serving on {replicas} instance(s)")
        }
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}
