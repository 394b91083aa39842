// ABOUTME: Library root for rollwright - exposes the rollout engine, pipeline, and supporting types.
// ABOUTME: The main binary is in main.rs.

pub mod cluster;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod history;
pub mod hooks;
pub mod manifest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod rollout;
pub mod types;
