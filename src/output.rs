// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes; doubles as a progress sink.

use serde::Serialize;
use std::time::Instant;

use crate::pipeline::{StageOutcome, StageResult};
use crate::progress::{PhaseChange, ProgressEvent, ProgressSink};

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

    fn duration_secs(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print a warning (suppressed in json mode, where warnings go to the log).
    pub fn warning(&self, message: &str) {
        if self.mode != OutputMode::Json {
            eprintln!("Warning: {message}");
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
                // Print only the essential result
                println!("{message}");
            }
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "success",
                    message,
                    duration_secs: self.duration_secs(),
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
                    duration_secs: self.duration_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Print a structured value as one JSON line (json mode only).
    pub fn json<T: Serialize>(&self, value: &T) {
        if self.mode == OutputMode::Json
            && let Ok(json) = serde_json::to_string(value)
        {
            println!("{json}");
        }
    }
}

fn format_stage(result: &StageResult) -> String {
    let secs = result.duration.as_secs_f64();
    match (&result.outcome, &result.error) {
        (StageOutcome::Failure, Some(error)) => format!(
            "    {} failed after {:.1}s ({}): {}",
            result.stage, secs, error.kind, error.message
        ),
        (StageOutcome::Skipped, _) => format!("    {} skipped", result.stage),
        (outcome, _) => format!("    {} {} ({:.1}s)", result.stage, outcome, secs),
    }
}

fn format_phase(change: &PhaseChange) -> String {
    format!(
        "      {}: {} -> {} ({}/{} ready)",
        change.workload, change.from, change.to, change.ready, change.desired
    )
}

impl ProgressSink for Output {
    fn emit(&self, event: &ProgressEvent) {
        match self.mode {
            OutputMode::Normal => match event {
                ProgressEvent::StageStarted { stage, .. } => println!("==> {stage}"),
                ProgressEvent::StageFinished(result) => println!("{}", format_stage(result)),
                ProgressEvent::PhaseChanged(change) => println!("{}", format_phase(change)),
            },
            OutputMode::Quiet => {
                if let ProgressEvent::StageFinished(result) = event
                    && result.outcome == StageOutcome::Failure
                {
                    eprintln!("{}", format_stage(result));
                }
            }
            OutputMode::Json => self.json(event),
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
