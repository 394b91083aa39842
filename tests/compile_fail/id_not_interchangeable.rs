// ABOUTME: Compile-fail test verifying RolloutId and RunId are not interchangeable.
// ABOUTME: This test should fail to compile, validating type safety.

use rollwright::types::{RolloutId, RunId};

fn takes_rollout_id(_id: RolloutId) {}

fn main() {
    let run_id = RunId::new("run-1".to_string());
    takes_rollout_id(run_id); // ERROR: expected RolloutId, found RunId
}
