// ABOUTME: Tests for rollout state transitions driven step by step.
// ABOUTME: Verifies transition methods exist, return the right state types, and record phases.

mod support;

use rollwright::cluster::memory::Behavior;
use rollwright::cluster::{ClusterClient, InMemoryCluster};
use rollwright::progress::TracingSink;
use rollwright::rollout::state::{Applied, Converged, Pending, Unconverged};
use rollwright::rollout::{
    RetryPolicy, Rollout, RolloutContext, RolloutPhase, RolloutRecord, TransitionResult,
};
use std::time::Duration;
use support::web_spec;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Transition Type Signature Tests
// =============================================================================

/// Test: Verifies the type signatures of all transition methods compile correctly.
/// This ensures the state machine is wired up properly at compile time.
#[test]
fn transition_type_signatures_compile() {
    // This function is never called, but it must compile.
    // If any type signature is wrong, this will fail to compile.
    #[allow(dead_code)]
    async fn check_signatures<C: ClusterClient>(ctx: &RolloutContext<'_, C>) {
        let spec = web_spec("shop/web:1", 1);

        // Pending -> Applied
        let r1: Rollout<Pending> = Rollout::new(spec, None);
        let r2: TransitionResult<Applied> = r1.apply(ctx).await;

        // Applied -> Converged
        let r3: TransitionResult<Converged> =
            r2.unwrap().await_ready(ctx, Duration::from_secs(60)).await;

        // Converged - terminal
        let _record: RolloutRecord = r3.unwrap().finish();
    }
}

/// Test: Rollback and abandon are available from Unconverged.
#[test]
fn rollback_from_unconverged_compiles() {
    #[allow(dead_code)]
    async fn check_rollback<C: ClusterClient>(
        rollout: Rollout<Unconverged>,
        ctx: &RolloutContext<'_, C>,
    ) -> RolloutRecord {
        rollout.rollback(ctx, Duration::from_secs(60)).await
    }

    #[allow(dead_code)]
    fn check_abandon(rollout: Rollout<Unconverged>) -> RolloutRecord {
        rollout.abandon()
    }
}

// =============================================================================
// Stepping through with the in-memory cluster
// =============================================================================

fn context<'a>(
    cluster: &'a InMemoryCluster,
    sink: &'a TracingSink,
    cancel: &'a CancellationToken,
) -> RolloutContext<'a, InMemoryCluster> {
    support::init_tracing();
    RolloutContext {
        client: cluster,
        retry: RetryPolicy::none(),
        poll_interval: Duration::from_secs(1),
        sink,
        cancel,
        deadline: None,
    }
}

#[tokio::test(start_paused = true)]
async fn stepwise_rollout_reaches_succeeded() {
    let cluster = InMemoryCluster::new();
    let (sink, cancel) = (TracingSink, CancellationToken::new());
    let ctx = context(&cluster, &sink, &cancel);

    let pending = Rollout::new(web_spec("shop/web:1", 2), None);
    assert_eq!(pending.record().phase(), RolloutPhase::Pending);

    let applied = pending.apply(&ctx).await.unwrap();
    assert_eq!(applied.record().phase(), RolloutPhase::Waiting);

    let converged = applied
        .await_ready(&ctx, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(converged.record().phase(), RolloutPhase::Succeeded);

    let record = converged.finish();
    assert!(record.is_finished());
}

#[tokio::test(start_paused = true)]
async fn unconverged_rollout_exposes_previous_spec() {
    let cluster = InMemoryCluster::new();
    let (sink, cancel) = (TracingSink, CancellationToken::new());
    let ctx = context(&cluster, &sink, &cancel);
    let s1 = web_spec("shop/web:1", 1);
    let s2 = web_spec("shop/web:2", 1);
    cluster.set_behavior(&s2.image, Behavior::CrashAfter(1));

    let applied = Rollout::new(s2, Some(s1.clone()))
        .apply(&ctx)
        .await
        .unwrap();
    let unconverged = applied
        .await_ready(&ctx, Duration::from_secs(10))
        .await
        .unwrap_err();

    assert_eq!(unconverged.record().phase(), RolloutPhase::Failed);
    assert_eq!(unconverged.previous(), Some(&s1));

    let record = unconverged.abandon();
    assert_eq!(record.phase(), RolloutPhase::Failed);
    assert!(record.is_finished());
}

#[tokio::test(start_paused = true)]
async fn revert_goes_straight_to_rolling_back() {
    let cluster = InMemoryCluster::new();
    let (sink, cancel) = (TracingSink, CancellationToken::new());
    let ctx = context(&cluster, &sink, &cancel);

    let record = Rollout::new(web_spec("shop/web:1", 1), None)
        .revert(&ctx, Duration::from_secs(10))
        .await;

    let phases: Vec<_> = record.transitions().iter().map(|t| t.to).collect();
    assert_eq!(phases, [RolloutPhase::RollingBack, RolloutPhase::RolledBack]);
}
