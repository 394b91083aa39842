// ABOUTME: In-memory ClusterClient that simulates workload convergence.
// ABOUTME: Scriptable readiness, crashes, rejections and outages for tests and dry runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

use super::client::{
    ApplyOutcome, ClusterClient, Resource, ResourceRef, ServiceStatus, WorkloadCondition,
    WorkloadStatus,
};
use super::error::ClusterError;
use crate::manifest::{DeploymentSpec, ServiceSpec};
use crate::types::{ImageRef, ServiceName, WorkloadName};

/// How workloads running a given image behave after being applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// All replicas are ready from the n-th status poll on; partially ready before.
    ReadyAfter(u32),
    /// Replicas never become ready.
    NeverReady,
    /// Replicas crash-loop; the workload reports a failed condition from the n-th poll.
    CrashAfter(u32),
}

impl Default for Behavior {
    fn default() -> Self {
        Behavior::ReadyAfter(1)
    }
}

#[derive(Debug)]
struct SimWorkload {
    spec: DeploymentSpec,
    polls: u32,
    ready_override: Option<u32>,
}

#[derive(Debug, Default)]
struct State {
    workloads: HashMap<WorkloadName, SimWorkload>,
    services: HashMap<ServiceName, ServiceSpec>,
    behaviors: HashMap<String, Behavior>,
    rejected_images: HashSet<String>,
    outage_calls: u32,
    mutations: usize,
    calls: usize,
}

/// A simulated cluster. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script how workloads running `image` converge.
    pub fn set_behavior(&self, image: &ImageRef, behavior: Behavior) {
        self.state.lock().behaviors.insert(image.to_string(), behavior);
    }

    /// Make applies of `image` fail with `Rejected`.
    pub fn reject_image(&self, image: &ImageRef) {
        self.state.lock().rejected_images.insert(image.to_string());
    }

    /// Fail the next `calls` operations with `Unreachable`.
    pub fn fail_next(&self, calls: u32) {
        self.state.lock().outage_calls = calls;
    }

    /// Pin the ready count a workload reports, as if pods were lost after rollout.
    pub fn degrade(&self, workload: &WorkloadName, ready: u32) {
        if let Some(w) = self.state.lock().workloads.get_mut(workload) {
            w.ready_override = Some(ready);
        }
    }

    /// The spec currently applied for a workload.
    pub fn current_spec(&self, workload: &WorkloadName) -> Option<DeploymentSpec> {
        self.state
            .lock()
            .workloads
            .get(workload)
            .map(|w| w.spec.clone())
    }

    pub fn service(&self, service: &ServiceName) -> Option<ServiceSpec> {
        self.state.lock().services.get(service).cloned()
    }

    /// Number of applies and deletes that changed cluster state.
    pub fn mutations(&self) -> usize {
        self.state.lock().mutations
    }

    /// Number of operations attempted, including failed ones.
    pub fn calls(&self) -> usize {
        self.state.lock().calls
    }

    fn begin_call(state: &mut State) -> Result<(), ClusterError> {
        state.calls += 1;
        if state.outage_calls > 0 {
            state.outage_calls -= 1;
            return Err(ClusterError::Unreachable(
                "simulated cluster outage".to_string(),
            ));
        }
        Ok(())
    }
}

/// Replicas ready after `polls` of the `needed` polls to converge.
fn partial_ready(desired: u32, polls: u32, needed: u32) -> u32 {
    let ready = u64::from(desired) * u64::from(polls) / u64::from(needed.max(1));
    u32::try_from(ready).unwrap_or(desired)
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn apply(&self, resource: Resource<'_>) -> Result<ApplyOutcome, ClusterError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        Self::begin_call(state)?;

        match resource {
            Resource::Deployment(spec) => {
                if state.rejected_images.contains(&spec.image.to_string()) {
                    return Err(ClusterError::Rejected(format!(
                        "image {} is not allowed",
                        spec.image
                    )));
                }

                let outcome = match state.workloads.get_mut(&spec.name) {
                    Some(existing) if existing.spec == *spec => ApplyOutcome::Unchanged,
                    Some(existing) => {
                        existing.spec = spec.clone();
                        existing.polls = 0;
                        existing.ready_override = None;
                        ApplyOutcome::Configured
                    }
                    None => {
                        state.workloads.insert(
                            spec.name.clone(),
                            SimWorkload {
                                spec: spec.clone(),
                                polls: 0,
                                ready_override: None,
                            },
                        );
                        ApplyOutcome::Created
                    }
                };
                if outcome.is_mutation() {
                    state.mutations += 1;
                }
                Ok(outcome)
            }
            Resource::Service(spec) => {
                let outcome = match state.services.get(&spec.name) {
                    Some(existing) if existing == spec => ApplyOutcome::Unchanged,
                    Some(_) => ApplyOutcome::Configured,
                    None => ApplyOutcome::Created,
                };
                if outcome.is_mutation() {
                    state.services.insert(spec.name.clone(), spec.clone());
                    state.mutations += 1;
                }
                Ok(outcome)
            }
        }
    }

    async fn status(&self, workload: &WorkloadName) -> Result<WorkloadStatus, ClusterError> {
        let mut state = self.state.lock();
        Self::begin_call(&mut state)?;

        let State {
            workloads,
            behaviors,
            ..
        } = &mut *state;
        let w = workloads
            .get_mut(workload)
            .ok_or_else(|| ClusterError::NotFound(format!("deployment/{}", workload)))?;
        w.polls = w.polls.saturating_add(1);

        let desired = w.spec.replicas;
        let behavior = behaviors
            .get(&w.spec.image.to_string())
            .copied()
            .unwrap_or_default();

        let (ready, condition) = match behavior {
            Behavior::ReadyAfter(n) if w.polls >= n => (desired, WorkloadCondition::Available),
            Behavior::ReadyAfter(n) => (
                partial_ready(desired, w.polls, n),
                WorkloadCondition::Progressing,
            ),
            Behavior::NeverReady => (0, WorkloadCondition::Progressing),
            Behavior::CrashAfter(n) if w.polls >= n => (
                0,
                WorkloadCondition::Failed {
                    reason: "CrashLoopBackOff".to_string(),
                },
            ),
            Behavior::CrashAfter(_) => (0, WorkloadCondition::Progressing),
        };

        let ready = w.ready_override.map_or(ready, |r| r.min(desired));
        let condition = match condition {
            WorkloadCondition::Available if ready < desired => WorkloadCondition::Progressing,
            other => other,
        };

        Ok(WorkloadStatus {
            desired_replicas: desired,
            ready_replicas: ready,
            condition,
        })
    }

    async fn describe_service(
        &self,
        service: &ServiceName,
    ) -> Result<ServiceStatus, ClusterError> {
        let mut state = self.state.lock();
        Self::begin_call(&mut state)?;

        state
            .services
            .get(service)
            .map(|spec| ServiceStatus {
                port: spec.port,
                target_port: spec.target_port,
                exposure: spec.exposure,
            })
            .ok_or_else(|| ClusterError::NotFound(format!("service/{}", service)))
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<(), ClusterError> {
        let mut state = self.state.lock();
        Self::begin_call(&mut state)?;

        let removed = match resource {
            ResourceRef::Deployment(name) => state.workloads.remove(name).is_some(),
            ResourceRef::Service(name) => state.services.remove(name).is_some(),
        };
        if !removed {
            return Err(ClusterError::NotFound(resource.to_string()));
        }
        state.mutations += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(tag: &str) -> DeploymentSpec {
        DeploymentSpec::new(
            WorkloadName::new("web").unwrap(),
            ImageRef::parse(&format!("web:{}", tag)).unwrap(),
            2,
        )
    }

    #[test]
    fn partial_progress_handles_huge_replica_counts() {
        assert_eq!(partial_ready(u32::MAX, 2, 4), u32::MAX / 2);
        assert_eq!(partial_ready(10, 3, 4), 7);
        assert_eq!(partial_ready(10, 1, 0), 10);
    }

    #[tokio::test]
    async fn identical_apply_is_unchanged() {
        let cluster = InMemoryCluster::new();
        let s = spec("1");

        assert_eq!(
            cluster.apply(Resource::Deployment(&s)).await.unwrap(),
            ApplyOutcome::Created
        );
        assert_eq!(
            cluster.apply(Resource::Deployment(&s)).await.unwrap(),
            ApplyOutcome::Unchanged
        );
        assert_eq!(cluster.mutations(), 1);
    }

    #[tokio::test]
    async fn ready_after_reports_partial_progress() {
        let cluster = InMemoryCluster::new();
        let s = spec("1");
        cluster.set_behavior(&s.image, Behavior::ReadyAfter(2));
        cluster.apply(Resource::Deployment(&s)).await.unwrap();

        let first = cluster.status(&s.name).await.unwrap();
        assert_eq!(first.ready_replicas, 1);
        assert_eq!(first.condition, WorkloadCondition::Progressing);

        let second = cluster.status(&s.name).await.unwrap();
        assert!(second.is_converged(2));
    }

    #[tokio::test]
    async fn outage_fails_the_next_calls() {
        let cluster = InMemoryCluster::new();
        cluster.fail_next(2);
        let s = spec("1");

        assert!(cluster.apply(Resource::Deployment(&s)).await.is_err());
        assert!(cluster.apply(Resource::Deployment(&s)).await.is_err());
        assert!(cluster.apply(Resource::Deployment(&s)).await.is_ok());
        assert_eq!(cluster.calls(), 3);
    }

    #[tokio::test]
    async fn status_of_unknown_workload_is_not_found() {
        let cluster = InMemoryCluster::new();
        let err = cluster
            .status(&WorkloadName::new("ghost").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ClusterError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_workload() {
        let cluster = InMemoryCluster::new();
        let s = spec("1");
        cluster.apply(Resource::Deployment(&s)).await.unwrap();
        cluster
            .delete(&ResourceRef::Deployment(s.name.clone()))
            .await
            .unwrap();
        assert!(cluster.current_spec(&s.name).is_none());
    }
}
