// ABOUTME: Application-wide error types and the failure taxonomy for rollwright.
// ABOUTME: Uses thiserror for ergonomic error handling and maps failures to exit codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::cluster::ClusterError;
use crate::history::HistoryError;
use crate::manifest::LoadError;
use crate::rollout::{RolloutError, RolloutPhase};
use crate::types::WorkloadName;

/// Failure categories shared by the rollout engine and the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad manifest or input. Fatal, never retried.
    Validation,
    /// Cluster unreachable after the retry budget was spent.
    TransientInfra,
    /// Replicas never became ready, or the workload reported a terminal failure.
    Convergence,
    /// Restoring the previous spec failed. Needs an operator.
    Rollback,
    /// Building or publishing the artifact failed.
    Artifact,
    /// Post-deploy checks found the cluster out of line with the manifest.
    Verification,
    /// The run was cancelled from outside.
    Cancelled,
}

impl ErrorKind {
    /// Whether this failure is a problem with the input rather than with the deployment.
    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorKind::Validation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation error",
            ErrorKind::TransientInfra => "infrastructure unreachable",
            ErrorKind::Convergence => "convergence failure",
            ErrorKind::Rollback => "rollback failure",
            ErrorKind::Artifact => "artifact failure",
            ErrorKind::Verification => "verification failure",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("environment variable not set: {0}")]
    MissingEnvVar(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Manifest(#[from] LoadError),

    #[error(transparent)]
    Rollout(#[from] RolloutError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("stage `{stage}` failed ({kind}): {message}")]
    StageFailed {
        stage: String,
        kind: ErrorKind,
        message: String,
    },

    #[error("rollout of `{workload}` ended {phase} ({kind}): {message}")]
    RolloutUnsuccessful {
        workload: WorkloadName,
        phase: RolloutPhase,
        kind: ErrorKind,
        message: String,
    },
}

impl Error {
    /// The failure category, for errors that carry one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Error::Manifest(LoadError::Parse { .. }) => Some(ErrorKind::Validation),
            Error::Rollout(e) => Some(e.kind()),
            Error::Cluster(e) => Some(e.kind()),
            Error::StageFailed { kind, .. } | Error::RolloutUnsuccessful { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }

    /// Process exit code: 2 for validation errors, 3 for deployment failures, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            Some(kind) if kind.is_validation() => 2,
            Some(_) => 3,
            None => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
