// ABOUTME: ClusterClient capability trait and the status types it reports.
// ABOUTME: Apply, status, describe and delete for workloads and services.

use async_trait::async_trait;
use std::fmt;

use super::error::ClusterError;
use crate::manifest::{DeploymentSpec, Exposure, ServiceSpec};
use crate::types::{ServiceName, WorkloadName};

/// A resource to submit to the cluster.
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Deployment(&'a DeploymentSpec),
    Service(&'a ServiceSpec),
}

impl Resource<'_> {
    pub fn to_ref(&self) -> ResourceRef {
        match self {
            Resource::Deployment(spec) => ResourceRef::Deployment(spec.name.clone()),
            Resource::Service(spec) => ResourceRef::Service(spec.name.clone()),
        }
    }
}

/// Identity of a resource in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceRef {
    Deployment(WorkloadName),
    Service(ServiceName),
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceRef::Deployment(name) => write!(f, "deployment/{}", name),
            ResourceRef::Service(name) => write!(f, "service/{}", name),
        }
    }
}

/// What an apply did to the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Configured,
    /// The cluster already held an identical spec; nothing changed.
    Unchanged,
}

impl ApplyOutcome {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, ApplyOutcome::Unchanged)
    }
}

impl fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyOutcome::Created => write!(f, "created"),
            ApplyOutcome::Configured => write!(f, "configured"),
            ApplyOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Health condition reported for a workload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadCondition {
    /// Replicas are being created or replaced.
    Progressing,
    /// Every desired replica of the current spec is ready.
    Available,
    /// The workload cannot converge without intervention (e.g. all replicas crash-looping).
    Failed { reason: String },
}

/// Readiness of a workload's current spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadStatus {
    pub desired_replicas: u32,
    /// Ready replicas running the most recently applied spec.
    pub ready_replicas: u32,
    pub condition: WorkloadCondition,
}

impl WorkloadStatus {
    pub fn is_converged(&self, desired: u32) -> bool {
        self.desired_replicas == desired && self.ready_replicas == desired
    }
}

/// Observed exposure of a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub port: u16,
    pub target_port: u16,
    pub exposure: Exposure,
}

/// Operations the rollout engine needs from a cluster.
///
/// Implementations make one attempt per call; retrying transient failures is
/// the caller's job.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create the resource if absent, patch it if present.
    async fn apply(&self, resource: Resource<'_>) -> Result<ApplyOutcome, ClusterError>;

    /// Report readiness of a workload.
    async fn status(&self, workload: &WorkloadName) -> Result<WorkloadStatus, ClusterError>;

    /// Report how a service is exposed.
    async fn describe_service(&self, service: &ServiceName)
    -> Result<ServiceStatus, ClusterError>;

    /// Remove a resource.
    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError>;
}
