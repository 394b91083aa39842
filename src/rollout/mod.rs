// ABOUTME: Rollout engine: converges workloads, enforces timeouts, rolls back failures.
// ABOUTME: Steps of one attempt are modelled as a type state.

mod engine;
mod error;
mod record;
mod retry;
pub mod state;
mod transitions;

pub use engine::{RolloutEngine, RolloutSettings};
pub use error::RolloutError;
pub use record::{PhaseTransition, Readiness, RolloutFailure, RolloutPhase, RolloutRecord};
pub use retry::RetryPolicy;
pub use transitions::{Rollout, RolloutContext, TransitionResult};
