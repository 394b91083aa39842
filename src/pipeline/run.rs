// ABOUTME: PipelineRun and StageResult: the append-only record of one pipeline run.
// ABOUTME: Serializable for JSON output and progress streaming.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::error::ErrorKind;
use crate::types::RunId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutcome {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Success => write!(f, "success"),
            StageOutcome::Failure => write!(f, "failure"),
            StageOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageResult {
    pub stage: String,
    pub outcome: StageOutcome,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub error: Option<StageFailure>,
}

impl StageResult {
    pub fn success(stage: impl Into<String>, duration: Duration) -> Self {
        Self {
            stage: stage.into(),
            outcome: StageOutcome::Success,
            duration,
            error: None,
        }
    }

    pub fn failure(stage: impl Into<String>, duration: Duration, error: StageFailure) -> Self {
        Self {
            stage: stage.into(),
            outcome: StageOutcome::Failure,
            duration,
            error: Some(error),
        }
    }

    pub fn skipped(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            outcome: StageOutcome::Skipped,
            duration: Duration::ZERO,
            error: None,
        }
    }
}

/// Overall state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Results of one pipeline run, in stage order.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub id: RunId,
    /// Host that ran the pipeline.
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    results: Vec<StageResult>,
}

impl PipelineRun {
    pub fn start() -> Self {
        Self {
            id: RunId::generate("run"),
            host: gethostname::gethostname().to_string_lossy().into_owned(),
            started_at: Utc::now(),
            finished_at: None,
            results: Vec::new(),
        }
    }

    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    pub(crate) fn push(&mut self, result: StageResult) {
        self.results.push(result);
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// The first failed stage, if any. There is at most one.
    pub fn failure(&self) -> Option<&StageResult> {
        self.results
            .iter()
            .find(|r| r.outcome == StageOutcome::Failure)
    }

    pub fn outcome_of(&self, stage: &str) -> Option<StageOutcome> {
        self.results
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }

    pub fn status(&self) -> RunStatus {
        if self.failure().is_some() {
            RunStatus::Failed
        } else if self.finished_at.is_some() {
            RunStatus::Succeeded
        } else {
            RunStatus::Running
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Succeeded
    }
}
