// ABOUTME: Status/progress stream for stage results and rollout phase transitions.
// ABOUTME: Events are emitted as they happen to a pluggable ProgressSink.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::pipeline::StageResult;
use crate::rollout::RolloutPhase;
use crate::types::{RolloutId, WorkloadName};

/// A rollout moved from one phase to another.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseChange {
    pub workload: WorkloadName,
    pub rollout: RolloutId,
    pub from: RolloutPhase,
    pub to: RolloutPhase,
    pub ready: u32,
    pub desired: u32,
    pub at: DateTime<Utc>,
}

/// One entry in the progress stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    StageStarted { stage: String, at: DateTime<Utc> },
    StageFinished(StageResult),
    PhaseChanged(PhaseChange),
}

/// Receives progress events in emission order.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: &ProgressEvent);
}

/// Writes every event to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::StageStarted { stage, .. } => {
                tracing::info!(stage = %stage, "stage started");
            }
            ProgressEvent::StageFinished(result) => {
                tracing::info!(
                    stage = %result.stage,
                    outcome = %result.outcome,
                    duration_ms = result.duration.as_millis() as u64,
                    "stage finished"
                );
            }
            ProgressEvent::PhaseChanged(change) => {
                tracing::info!(
                    workload = %change.workload,
                    rollout = %change.rollout,
                    from = %change.from,
                    to = %change.to,
                    ready = change.ready,
                    desired = change.desired,
                    "rollout phase changed"
                );
            }
        }
    }
}

/// Forwards events into an unbounded channel for dashboards and tests.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: &ProgressEvent) {
        // A dropped receiver only means nobody is watching
        let _ = self.tx.send(event.clone());
    }
}

/// Sends every event to each inner sink in turn.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ProgressSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl ProgressSink for FanoutSink {
    fn emit(&self, event: &ProgressEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}
