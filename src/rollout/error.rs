// ABOUTME: Errors the rollout engine reports before or instead of a rollout.
// ABOUTME: Convergence failures are recorded on the RolloutRecord, not raised.

use crate::error::ErrorKind;
use crate::types::WorkloadName;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RolloutError {
    /// The request was rejected before anything touched the cluster.
    #[error("invalid rollout input: {0}")]
    InvalidInput(String),

    #[error("no previous successful rollout of `{0}` to roll back to")]
    NoPreviousRollout(WorkloadName),
}

impl RolloutError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RolloutError::InvalidInput(_) => ErrorKind::Validation,
            RolloutError::NoPreviousRollout(_) => ErrorKind::Rollback,
        }
    }
}
