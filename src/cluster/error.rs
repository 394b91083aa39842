// ABOUTME: Errors reported by cluster client adapters.
// ABOUTME: Distinguishes retryable transport failures from semantic rejections.

use crate::error::ErrorKind;

/// Errors from cluster operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterError {
    /// The cluster API could not be reached. Retryable.
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// The cluster refused the request (invalid spec, forbidden). Fatal.
    #[error("rejected by cluster: {0}")]
    Rejected(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl ClusterError {
    /// Only transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::Unreachable(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClusterError::Unreachable(_) => ErrorKind::TransientInfra,
            ClusterError::Rejected(_) => ErrorKind::Validation,
            ClusterError::NotFound(_) => ErrorKind::Verification,
        }
    }
}
