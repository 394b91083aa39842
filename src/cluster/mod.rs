// ABOUTME: Cluster client adapter: the capability interface to a remote cluster.
// ABOUTME: Ships a kubectl-backed client and an in-memory simulation.

mod client;
mod error;
mod kubectl;
pub mod memory;
mod render;

pub use client::{
    ApplyOutcome, ClusterClient, Resource, ResourceRef, ServiceStatus, WorkloadCondition,
    WorkloadStatus,
};
pub use error::ClusterError;
pub use kubectl::{KubectlCluster, KubectlError};
pub use memory::InMemoryCluster;
pub use render::{render_deployment, render_service};
