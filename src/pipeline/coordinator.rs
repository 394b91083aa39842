// ABOUTME: Runs pipeline stages strictly in order, halting on the first failure.
// ABOUTME: Emits each stage result as it completes and honours cancellation.

use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::run::{PipelineRun, StageFailure, StageResult};
use super::stage::{Stage, StageContext};
use crate::error::ErrorKind;
use crate::progress::{ProgressEvent, ProgressSink, TracingSink};

/// Sequences stages and owns the resulting [`PipelineRun`].
#[derive(Clone)]
pub struct Coordinator {
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self {
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        }
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `stages` with a fresh context.
    pub async fn run(&self, stages: &[Box<dyn Stage>]) -> PipelineRun {
        let mut ctx = StageContext::default();
        self.run_with_context(stages, &mut ctx).await
    }

    /// Run `stages`, leaving their outputs in `ctx`.
    ///
    /// Once a stage fails, or cancellation is observed before a stage starts,
    /// every later stage is recorded as skipped.
    pub async fn run_with_context(
        &self,
        stages: &[Box<dyn Stage>],
        ctx: &mut StageContext,
    ) -> PipelineRun {
        let mut run = PipelineRun::start();
        let mut halted = false;

        tracing::info!(run = %run.id, stages = stages.len(), "pipeline started");

        for stage in stages {
            let name = stage.name();

            let result = if halted {
                StageResult::skipped(name)
            } else if self.cancel.is_cancelled() {
                halted = true;
                tracing::warn!(stage = name, "pipeline cancelled");
                StageResult::failure(
                    name,
                    std::time::Duration::ZERO,
                    StageFailure {
                        kind: ErrorKind::Cancelled,
                        message: "pipeline cancelled before stage started".to_string(),
                    },
                )
            } else {
                self.sink.emit(&ProgressEvent::StageStarted {
                    stage: name.to_string(),
                    at: Utc::now(),
                });

                let started = Instant::now();
                match stage.execute(ctx).await {
                    Ok(()) => {
                        tracing::info!(stage = name, "stage succeeded");
                        StageResult::success(name, started.elapsed())
                    }
                    Err(e) => {
                        halted = true;
                        tracing::error!(
                            stage = name,
                            kind = %e.kind,
                            error = %e.message,
                            "stage failed"
                        );
                        StageResult::failure(
                            name,
                            started.elapsed(),
                            StageFailure {
                                kind: e.kind,
                                message: e.message,
                            },
                        )
                    }
                }
            };

            self.sink.emit(&ProgressEvent::StageFinished(result.clone()));
            run.push(result);
        }

        run.finish();
        tracing::info!(run = %run.id, status = ?run.status(), "pipeline finished");
        run
    }
}

/// A named, self-contained pipeline for [`run_concurrent`].
pub struct Pipeline {
    pub name: String,
    pub stages: Vec<Box<dyn Stage>>,
    pub coordinator: Coordinator,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            stages,
            coordinator: Coordinator::new(),
        }
    }

    pub fn with_coordinator(mut self, coordinator: Coordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub async fn run(&self) -> PipelineRun {
        self.coordinator.run(&self.stages).await
    }
}

/// Drive independent pipelines concurrently. Results keep the input order.
pub async fn run_concurrent(pipelines: Vec<Pipeline>) -> Vec<(String, PipelineRun)> {
    join_all(pipelines.into_iter().map(|pipeline| async move {
        let run = pipeline.run().await;
        (pipeline.name, run)
    }))
    .await
}
