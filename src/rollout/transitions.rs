// ABOUTME: Rollout type state: each step consumes self and returns the next state.
// ABOUTME: Rollback is only reachable from a rollout that failed to converge.

use humantime_serde::re::humantime::format_duration;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::cluster::{ClusterClient, ClusterError, Resource, WorkloadCondition};
use crate::error::ErrorKind;
use crate::manifest::DeploymentSpec;
use crate::progress::{PhaseChange, ProgressEvent, ProgressSink};

use super::record::{Readiness, RolloutPhase, RolloutRecord};
use super::retry::RetryPolicy;
use super::state::{Applied, Converged, Pending, Unconverged};

/// Result type for steps that leave the rollout unconverged on failure.
pub type TransitionResult<T> = Result<Rollout<T>, Rollout<Unconverged>>;

/// Everything a rollout step needs from its surroundings.
pub struct RolloutContext<'a, C: ClusterClient + ?Sized> {
    pub client: &'a C,
    pub retry: RetryPolicy,
    pub poll_interval: Duration,
    pub sink: &'a dyn ProgressSink,
    pub cancel: &'a CancellationToken,
    /// Bound on the whole rollout, apply included. Rollbacks get their own.
    pub deadline: Option<Instant>,
}

/// A rollout in progress, parameterized by its current state.
#[derive(Debug)]
pub struct Rollout<S> {
    record: RolloutRecord,
    state: S,
}

/// How a readiness wait ended.
enum Wait {
    Converged,
    Failed(String),
    TimedOut,
    Cancelled,
    Unavailable(ClusterError),
}

// =============================================================================
// Internal Helpers
// =============================================================================

impl<S> Rollout<S> {
    /// The record as it stands after the last step.
    pub fn record(&self) -> &RolloutRecord {
        &self.record
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    fn transition<T>(self, state: T) -> Rollout<T> {
        Rollout {
            record: self.record,
            state,
        }
    }

    fn enter<C: ClusterClient + ?Sized>(
        &mut self,
        phase: RolloutPhase,
        ctx: &RolloutContext<'_, C>,
    ) {
        let Some(transition) = self.record.advance(phase) else {
            return;
        };
        tracing::debug!(
            workload = %self.record.workload(),
            rollout = %self.record.id,
            from = %transition.from,
            to = %transition.to,
            "phase transition"
        );
        ctx.sink.emit(&ProgressEvent::PhaseChanged(PhaseChange {
            workload: self.record.workload().clone(),
            rollout: self.record.id.clone(),
            from: transition.from,
            to: transition.to,
            ready: self.record.readiness.ready,
            desired: self.record.readiness.desired,
            at: transition.at,
        }));
    }

    fn halt<C: ClusterClient + ?Sized>(
        mut self,
        phase: RolloutPhase,
        kind: ErrorKind,
        message: String,
        ctx: &RolloutContext<'_, C>,
    ) -> Rollout<Unconverged> {
        tracing::warn!(
            workload = %self.record.workload(),
            phase = %phase,
            error = %message,
            "rollout did not converge"
        );
        self.record.fail(kind, message);
        self.enter(phase, ctx);
        self.transition(Unconverged)
    }

    /// Re-apply `spec` and wait for it, ignoring cancellation.
    async fn restore<C: ClusterClient + ?Sized>(
        mut self,
        spec: DeploymentSpec,
        ctx: &RolloutContext<'_, C>,
        timeout: Duration,
    ) -> RolloutRecord {
        tracing::warn!(
            workload = %spec.name,
            image = %spec.image,
            "rolling back to previous spec"
        );
        self.enter(RolloutPhase::RollingBack, ctx);

        let deadline = Instant::now() + timeout;
        let applied = ctx
            .retry
            .run_before("apply", Some(deadline), || {
                ctx.client.apply(Resource::Deployment(&spec))
            })
            .await;

        let outcome = match applied {
            Ok(_) => {
                let mut readiness = Readiness {
                    desired: spec.replicas,
                    ready: 0,
                };
                let wait = wait_for_convergence(ctx, &spec, deadline, &mut readiness, None).await;
                self.record.readiness = readiness;
                wait
            }
            Err(e) => Wait::Unavailable(e),
        };

        let reason = match outcome {
            Wait::Converged => None,
            Wait::Failed(reason) => Some(reason),
            Wait::TimedOut => Some(format!(
                "previous spec not ready after {}",
                format_duration(timeout)
            )),
            Wait::Cancelled => Some("cancelled".to_string()),
            Wait::Unavailable(e) => Some(e.to_string()),
        };

        match reason {
            None => self.enter(RolloutPhase::RolledBack, ctx),
            Some(reason) => {
                tracing::error!(workload = %spec.name, error = %reason, "rollback failed");
                let message = match &self.record.failure {
                    Some(original) => format!("{}; rollback failed: {}", original.message, reason),
                    None => format!("rollback failed: {}", reason),
                };
                self.record.fail(ErrorKind::Rollback, message);
                self.enter(RolloutPhase::RollbackFailed, ctx);
            }
        }

        self.record.finish();
        self.record
    }
}

fn failure_kind(err: &ClusterError) -> ErrorKind {
    match err {
        ClusterError::NotFound(_) => ErrorKind::Convergence,
        other => other.kind(),
    }
}

/// Poll readiness until the spec converges, fails, passes `deadline`, or
/// `cancel` fires. Sleeps and retry backoff are clamped to the time remaining.
async fn wait_for_convergence<C: ClusterClient + ?Sized>(
    ctx: &RolloutContext<'_, C>,
    spec: &DeploymentSpec,
    deadline: Instant,
    readiness: &mut Readiness,
    cancel: Option<&CancellationToken>,
) -> Wait {
    loop {
        if cancel.is_some_and(|c| c.is_cancelled()) {
            return Wait::Cancelled;
        }

        let status = match ctx
            .retry
            .run_before("status", Some(deadline), || ctx.client.status(&spec.name))
            .await
        {
            Ok(status) => status,
            // An outage that outlasts the deadline is a timeout, not a failure
            Err(e) if e.is_retryable() && Instant::now() >= deadline => return Wait::TimedOut,
            Err(e) => return Wait::Unavailable(e),
        };
        readiness.ready = status.ready_replicas;

        tracing::debug!(
            workload = %spec.name,
            ready = status.ready_replicas,
            desired = spec.replicas,
            "polled readiness"
        );

        if status.is_converged(spec.replicas) {
            return Wait::Converged;
        }
        if let WorkloadCondition::Failed { reason } = status.condition {
            return Wait::Failed(reason);
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Wait::TimedOut;
        }
        let pause = ctx.poll_interval.min(remaining);

        match cancel {
            Some(token) => {
                tokio::select! {
                    _ = tokio::time::sleep(pause) => {}
                    _ = token.cancelled() => return Wait::Cancelled,
                }
            }
            None => tokio::time::sleep(pause).await,
        }
    }
}

// =============================================================================
// Pending -> Applied
// =============================================================================

impl Rollout<Pending> {
    /// Start a rollout of `target`. `previous` is what a failed rollout restores.
    pub fn new(target: DeploymentSpec, previous: Option<DeploymentSpec>) -> Self {
        Rollout {
            record: RolloutRecord::new(target, previous),
            state: Pending,
        }
    }

    /// Submit the target spec to the cluster.
    ///
    /// # Errors
    ///
    /// A rejected spec leaves the rollout `Failed` with the `Validation` kind;
    /// an unreachable cluster leaves it `Failed` with `TransientInfra` once
    /// retries are spent.
    #[must_use = "rollout state must be used"]
    pub async fn apply<C: ClusterClient + ?Sized>(
        mut self,
        ctx: &RolloutContext<'_, C>,
    ) -> TransitionResult<Applied> {
        self.enter(RolloutPhase::Applying, ctx);

        if ctx.cancel.is_cancelled() {
            return Err(self.halt(
                RolloutPhase::Cancelled,
                ErrorKind::Cancelled,
                "cancelled before apply".to_string(),
                ctx,
            ));
        }

        let target = &self.record.target;
        let result = ctx
            .retry
            .run_before("apply", ctx.deadline, || {
                ctx.client.apply(Resource::Deployment(target))
            })
            .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    workload = %self.record.workload(),
                    image = %self.record.target.image,
                    outcome = %outcome,
                    "applied deployment"
                );
                self.enter(RolloutPhase::Waiting, ctx);
                Ok(self.transition(Applied))
            }
            Err(e) => Err(self.halt(RolloutPhase::Failed, failure_kind(&e), e.to_string(), ctx)),
        }
    }

    /// Restore the record's target as a rollback of `previous`, without a
    /// failed attempt first. Used for operator-requested rollbacks.
    pub async fn revert<C: ClusterClient + ?Sized>(
        self,
        ctx: &RolloutContext<'_, C>,
        timeout: Duration,
    ) -> RolloutRecord {
        let target = self.record.target.clone();
        self.restore(target, ctx, timeout).await
    }
}

// =============================================================================
// Applied -> Converged | Unconverged
// =============================================================================

impl Rollout<Applied> {
    /// Poll until every desired replica is ready or `timeout` elapses, whichever
    /// comes first with the context's deadline.
    #[must_use = "rollout state must be used"]
    pub async fn await_ready<C: ClusterClient + ?Sized>(
        mut self,
        ctx: &RolloutContext<'_, C>,
        timeout: Duration,
    ) -> TransitionResult<Converged> {
        let mut readiness = self.record.readiness;
        let mut deadline = Instant::now() + timeout;
        if let Some(bound) = ctx.deadline {
            deadline = deadline.min(bound);
        }
        let wait = wait_for_convergence(
            ctx,
            &self.record.target,
            deadline,
            &mut readiness,
            Some(ctx.cancel),
        )
        .await;
        self.record.readiness = readiness;

        match wait {
            Wait::Converged => {
                self.enter(RolloutPhase::Succeeded, ctx);
                Ok(self.transition(Converged))
            }
            Wait::Failed(reason) => Err(self.halt(
                RolloutPhase::Failed,
                ErrorKind::Convergence,
                reason,
                ctx,
            )),
            Wait::TimedOut => {
                let message = format!(
                    "{} of {} replicas ready after {}",
                    readiness.ready,
                    readiness.desired,
                    format_duration(timeout)
                );
                Err(self.halt(RolloutPhase::TimedOut, ErrorKind::Convergence, message, ctx))
            }
            Wait::Cancelled => Err(self.halt(
                RolloutPhase::Cancelled,
                ErrorKind::Cancelled,
                "rollout cancelled".to_string(),
                ctx,
            )),
            Wait::Unavailable(e) => {
                Err(self.halt(RolloutPhase::Failed, failure_kind(&e), e.to_string(), ctx))
            }
        }
    }
}

// =============================================================================
// Converged -> done
// =============================================================================

impl Rollout<Converged> {
    pub fn finish(mut self) -> RolloutRecord {
        self.record.finish();
        tracing::info!(
            workload = %self.record.workload(),
            image = %self.record.target.image,
            "rollout succeeded"
        );
        self.record
    }
}

// =============================================================================
// Unconverged -> RolledBack | RollbackFailed | done
// =============================================================================

impl Rollout<Unconverged> {
    /// The spec a rollback would restore.
    pub fn previous(&self) -> Option<&DeploymentSpec> {
        self.record.previous.as_ref()
    }

    /// Re-apply the previous spec and wait for it to converge.
    ///
    /// Without a previous spec the failure is final and the record is
    /// returned as-is.
    pub async fn rollback<C: ClusterClient + ?Sized>(
        self,
        ctx: &RolloutContext<'_, C>,
        timeout: Duration,
    ) -> RolloutRecord {
        match self.record.previous.clone() {
            Some(previous) => self.restore(previous, ctx, timeout).await,
            None => {
                tracing::warn!(
                    workload = %self.record.workload(),
                    "no previous spec to roll back to"
                );
                self.abandon()
            }
        }
    }

    /// Leave the failure in place without rolling back.
    pub fn abandon(mut self) -> RolloutRecord {
        self.record.finish();
        self.record
    }
}
