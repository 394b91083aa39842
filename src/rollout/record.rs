// ABOUTME: RolloutRecord and the phase machine for one convergence attempt.
// ABOUTME: Records every phase transition with its timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ErrorKind;
use crate::manifest::DeploymentSpec;
use crate::types::{RolloutId, WorkloadName};

/// Phase of a rollout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutPhase {
    Pending,
    Applying,
    Waiting,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
    RollingBack,
    RolledBack,
    RollbackFailed,
}

impl RolloutPhase {
    /// Whether the phase machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: RolloutPhase) -> bool {
        use RolloutPhase::*;
        matches!(
            (self, next),
            (Pending, Applying)
                | (Pending, RollingBack)
                | (Applying, Waiting)
                | (Applying, Failed)
                | (Applying, Cancelled)
                | (Waiting, Succeeded)
                | (Waiting, Failed)
                | (Waiting, TimedOut)
                | (Waiting, Cancelled)
                | (Failed, RollingBack)
                | (TimedOut, RollingBack)
                | (Cancelled, RollingBack)
                | (RollingBack, RolledBack)
                | (RollingBack, RollbackFailed)
        )
    }

    /// Phases reached when the new spec did not converge.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RolloutPhase::Failed | RolloutPhase::TimedOut | RolloutPhase::Cancelled
        )
    }

    /// Phases no rollout ever leaves.
    ///
    /// Failure phases are terminal only when no rollback follows, which the
    /// phase alone cannot tell; see [`RolloutRecord::is_finished`].
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            RolloutPhase::Succeeded | RolloutPhase::RolledBack | RolloutPhase::RollbackFailed
        )
    }
}

impl fmt::Display for RolloutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RolloutPhase::Pending => "pending",
            RolloutPhase::Applying => "applying",
            RolloutPhase::Waiting => "waiting",
            RolloutPhase::Succeeded => "succeeded",
            RolloutPhase::Failed => "failed",
            RolloutPhase::TimedOut => "timed out",
            RolloutPhase::Cancelled => "cancelled",
            RolloutPhase::RollingBack => "rolling back",
            RolloutPhase::RolledBack => "rolled back",
            RolloutPhase::RollbackFailed => "rollback failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub desired: u32,
    pub ready: u32,
}

/// Why a rollout did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutFailure {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub from: RolloutPhase,
    pub to: RolloutPhase,
    pub at: DateTime<Utc>,
}

/// One attempt to converge a workload to a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RolloutRecord {
    pub id: RolloutId,
    pub target: DeploymentSpec,
    /// The spec restored if the target fails.
    pub previous: Option<DeploymentSpec>,
    phase: RolloutPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub readiness: Readiness,
    pub failure: Option<RolloutFailure>,
    transitions: Vec<PhaseTransition>,
}

impl RolloutRecord {
    pub fn new(target: DeploymentSpec, previous: Option<DeploymentSpec>) -> Self {
        let readiness = Readiness {
            desired: target.replicas,
            ready: 0,
        };
        Self {
            id: RolloutId::generate(target.name.as_str()),
            target,
            previous,
            phase: RolloutPhase::Pending,
            started_at: Utc::now(),
            finished_at: None,
            readiness,
            failure: None,
            transitions: Vec::new(),
        }
    }

    pub fn workload(&self) -> &WorkloadName {
        &self.target.name
    }

    pub fn phase(&self) -> RolloutPhase {
        self.phase
    }

    /// Phase transitions in the order they happened.
    pub fn transitions(&self) -> &[PhaseTransition] {
        &self.transitions
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Move to `next`, recording the transition.
    ///
    /// Returns the transition, or `None` when the phase machine forbids it
    /// (the phase is left unchanged).
    pub(crate) fn advance(&mut self, next: RolloutPhase) -> Option<PhaseTransition> {
        if !self.phase.can_transition_to(next) {
            tracing::error!(
                rollout = %self.id,
                from = %self.phase,
                to = %next,
                "illegal rollout phase transition ignored"
            );
            return None;
        }
        let transition = PhaseTransition {
            from: self.phase,
            to: next,
            at: Utc::now(),
        };
        self.phase = next;
        self.transitions.push(transition.clone());
        Some(transition)
    }

    pub(crate) fn fail(&mut self, kind: ErrorKind, message: impl Into<String>) {
        self.failure = Some(RolloutFailure {
            kind,
            message: message.into(),
        });
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}
