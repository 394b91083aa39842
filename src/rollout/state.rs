// ABOUTME: Rollout state marker types for the type state pattern.
// ABOUTME: Zero-sized types enforce valid rollout steps at compile time.

/// Initial state: nothing submitted yet.
/// Available actions: `apply()`, `revert()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pending;

/// The target spec was accepted by the cluster.
/// Available actions: `await_ready()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Applied;

/// Every desired replica of the target spec is ready.
/// Available actions: `finish()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Converged;

/// The target spec failed, timed out or was cancelled.
/// Available actions: `rollback()`, `abandon()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Unconverged;
