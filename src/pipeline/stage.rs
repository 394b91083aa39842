// ABOUTME: Stage capability trait and the context that carries outputs between stages.
// ABOUTME: Built-in stages live in the stages module; tests substitute their own.

use async_trait::async_trait;

use super::publisher::{ArtifactRef, PublishError};
use crate::cluster::ClusterError;
use crate::error::ErrorKind;
use crate::rollout::{RolloutError, RolloutRecord};
use crate::types::ImageRef;

/// Outputs of earlier stages, visible to later ones.
#[derive(Debug, Clone, Default)]
pub struct StageContext {
    pub artifact: Option<ArtifactRef>,
    pub image: Option<ImageRef>,
    /// Records of every rollout a deploy stage ran, in order.
    pub records: Vec<RolloutRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StageError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn verification(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Verification, message)
    }
}

impl From<ClusterError> for StageError {
    fn from(err: ClusterError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<RolloutError> for StageError {
    fn from(err: RolloutError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<PublishError> for StageError {
    fn from(err: PublishError) -> Self {
        Self::new(ErrorKind::Artifact, err.to_string())
    }
}

/// One step of a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Name recorded in the stage's result.
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &mut StageContext) -> Result<(), StageError>;
}
