// ABOUTME: Compile-fail test verifying await_ready cannot be called before apply.
// ABOUTME: This test should fail to compile, validating state machine safety.

use rollwright::cluster::ClusterClient;
use rollwright::manifest::DeploymentSpec;
use rollwright::rollout::{Rollout, RolloutContext};
use std::time::Duration;

async fn try_wait_without_apply<C: ClusterClient>(spec: DeploymentSpec, ctx: &RolloutContext<'_, C>) {
    let rollout = Rollout::new(spec, None);

    // ERROR: await_ready() method doesn't exist on Rollout<Pending>
    let _ = rollout.await_ready(ctx, Duration::from_secs(60)).await;
}

fn main() {}
