// ABOUTME: RolloutEngine drives a workload to a DeploymentSpec and keeps its history.
// ABOUTME: Applies, waits for readiness, and rolls back failed rollouts when allowed.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::{
    ApplyOutcome, ClusterClient, ClusterError, Resource, ServiceStatus, WorkloadStatus,
};
use crate::history::RolloutHistory;
use crate::manifest::{DeploymentSpec, ServiceSpec};
use crate::progress::{ProgressSink, TracingSink};
use crate::types::{ServiceName, WorkloadName};

use super::error::RolloutError;
use super::record::{RolloutPhase, RolloutRecord};
use super::retry::RetryPolicy;
use super::state::Unconverged;
use super::transitions::{Rollout, RolloutContext};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Engine tuning, normally taken from the `rollout` and `rollback` config sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutSettings {
    pub poll_interval: Duration,
    pub retry: RetryPolicy,
    /// Restore the previous spec when a rollout fails, times out or is cancelled.
    pub automatic_rollback: bool,
}

impl Default for RolloutSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry: RetryPolicy::default(),
            automatic_rollback: true,
        }
    }
}

/// Converges workloads through a [`ClusterClient`].
///
/// Each engine owns its history; independent engines share nothing.
pub struct RolloutEngine<C: ClusterClient + ?Sized> {
    client: Arc<C>,
    settings: RolloutSettings,
    history: Mutex<RolloutHistory>,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl<C: ClusterClient + ?Sized> RolloutEngine<C> {
    pub fn new(client: Arc<C>, settings: RolloutSettings) -> Self {
        Self {
            client,
            settings,
            history: Mutex::new(RolloutHistory::new()),
            sink: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Seed the engine with history loaded from a previous run.
    pub fn with_history(mut self, history: RolloutHistory) -> Self {
        self.history = Mutex::new(history);
        self
    }

    /// Stop waiting and roll back when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn settings(&self) -> &RolloutSettings {
        &self.settings
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A snapshot of the engine's history.
    pub fn history(&self) -> RolloutHistory {
        self.history.lock().clone()
    }

    pub fn last_record(&self, workload: &WorkloadName) -> Option<RolloutRecord> {
        self.history.lock().last_record(workload).cloned()
    }

    fn context(&self) -> RolloutContext<'_, C> {
        RolloutContext {
            client: &*self.client,
            retry: self.settings.retry,
            poll_interval: self.settings.poll_interval,
            sink: &*self.sink,
            cancel: &self.cancel,
            deadline: None,
        }
    }

    /// Converge the workload named by `spec` to it.
    ///
    /// Returns the finished record whatever the outcome; inspect its phase.
    ///
    /// # Errors
    ///
    /// Returns `RolloutError::InvalidInput` without touching the cluster if the
    /// image has neither tag nor digest or `timeout` is zero.
    pub async fn roll_out(
        &self,
        spec: DeploymentSpec,
        timeout: Duration,
    ) -> Result<RolloutRecord, RolloutError> {
        if !spec.image.is_resolvable() {
            return Err(RolloutError::InvalidInput(format!(
                "image {} has no tag or digest",
                spec.image
            )));
        }
        check_timeout(timeout)?;

        let previous = self
            .history
            .lock()
            .current(&spec.name)
            .filter(|current| **current != spec)
            .cloned();

        tracing::info!(
            workload = %spec.name,
            image = %spec.image,
            replicas = spec.replicas,
            has_previous = previous.is_some(),
            "starting rollout"
        );

        let ctx = RolloutContext {
            deadline: Some(Instant::now() + timeout),
            ..self.context()
        };
        let record = match Rollout::new(spec, previous).apply(&ctx).await {
            Ok(applied) => match applied.await_ready(&ctx, timeout).await {
                Ok(converged) => converged.finish(),
                Err(unconverged) => self.recover(unconverged, &ctx, timeout).await,
            },
            Err(unconverged) => self.recover(unconverged, &ctx, timeout).await,
        };

        self.history.lock().record(&record);
        Ok(record)
    }

    async fn recover(
        &self,
        unconverged: Rollout<Unconverged>,
        ctx: &RolloutContext<'_, C>,
        timeout: Duration,
    ) -> RolloutRecord {
        if self.settings.automatic_rollback {
            unconverged.rollback(ctx, timeout).await
        } else {
            tracing::warn!(
                workload = %unconverged.record().workload(),
                "automatic rollback disabled, leaving failed rollout in place"
            );
            unconverged.abandon()
        }
    }

    /// Restore the spec that preceded the workload's current one.
    ///
    /// # Errors
    ///
    /// Returns `RolloutError::NoPreviousRollout` when history holds no earlier
    /// successful spec.
    pub async fn rollback(
        &self,
        workload: &WorkloadName,
        timeout: Duration,
    ) -> Result<RolloutRecord, RolloutError> {
        check_timeout(timeout)?;

        let (target, current) = {
            let history = self.history.lock();
            match (history.previous(workload), history.current(workload)) {
                (Some(previous), current) => (previous.clone(), current.cloned()),
                (None, _) => return Err(RolloutError::NoPreviousRollout(workload.clone())),
            }
        };

        tracing::info!(workload = %workload, image = %target.image, "manual rollback requested");

        let ctx = self.context();
        let record = Rollout::new(target, current).revert(&ctx, timeout).await;

        let mut history = self.history.lock();
        if record.phase() == RolloutPhase::RolledBack {
            history.swap(workload);
        }
        history.record(&record);
        Ok(record)
    }

    /// Apply a service. Call once its deployment has converged.
    pub async fn expose(&self, service: &ServiceSpec) -> Result<ApplyOutcome, ClusterError> {
        let outcome = self
            .settings
            .retry
            .run("apply", || self.client.apply(Resource::Service(service)))
            .await?;
        tracing::info!(
            service = %service.name,
            exposure = %service.exposure,
            outcome = %outcome,
            "applied service"
        );
        Ok(outcome)
    }

    pub async fn workload_status(
        &self,
        workload: &WorkloadName,
    ) -> Result<WorkloadStatus, ClusterError> {
        self.settings
            .retry
            .run("status", || self.client.status(workload))
            .await
    }

    pub async fn service_status(
        &self,
        service: &ServiceName,
    ) -> Result<ServiceStatus, ClusterError> {
        self.settings
            .retry
            .run("describe", || self.client.describe_service(service))
            .await
    }
}

fn check_timeout(timeout: Duration) -> Result<(), RolloutError> {
    if timeout.is_zero() {
        return Err(RolloutError::InvalidInput(
            "timeout must be positive".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::InMemoryCluster;
    use crate::types::ImageRef;

    fn engine() -> RolloutEngine<InMemoryCluster> {
        RolloutEngine::new(Arc::new(InMemoryCluster::new()), RolloutSettings::default())
    }

    fn spec(image: &str) -> DeploymentSpec {
        DeploymentSpec::new(
            WorkloadName::new("web").unwrap(),
            ImageRef::parse(image).unwrap(),
            2,
        )
    }

    #[tokio::test]
    async fn rejects_untagged_image_before_touching_cluster() {
        let engine = engine();
        let err = engine
            .roll_out(spec("shop/web"), Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(err, RolloutError::InvalidInput(_)));
        assert_eq!(engine.client().calls(), 0);
    }

    #[tokio::test]
    async fn rejects_zero_timeout() {
        let engine = engine();
        let err = engine
            .roll_out(spec("shop/web:1"), Duration::ZERO)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn rollback_without_history_is_an_error() {
        let engine = engine();
        let web = WorkloadName::new("web").unwrap();
        let err = engine
            .rollback(&web, Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err, RolloutError::NoPreviousRollout(web));
    }
}
