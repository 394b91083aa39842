// ABOUTME: Compile-fail test verifying rollback cannot be called on a converged rollout.
// ABOUTME: This test should fail to compile, validating state machine safety.

use rollwright::cluster::ClusterClient;
use rollwright::rollout::state::Converged;
use rollwright::rollout::{Rollout, RolloutContext};
use std::time::Duration;

async fn try_invalid_rollback<C: ClusterClient>(
    rollout: Rollout<Converged>,
    ctx: &RolloutContext<'_, C>,
) {
    // ERROR: rollback() method doesn't exist on Rollout<Converged>
    rollout.rollback(ctx, Duration::from_secs(60)).await;
}

fn main() {}
