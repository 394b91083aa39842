// ABOUTME: Rollback command implementation.
// ABOUTME: Restores a workload's previous successful spec recorded in history.

use std::sync::Arc;
use std::time::Duration;

use rollwright::config::Config;
use rollwright::diagnostics::{Diagnostics, Warning};
use rollwright::error::{Error, ErrorKind, Result};
use rollwright::history::HistoryStore;
use rollwright::output::Output;
use rollwright::rollout::{RolloutEngine, RolloutPhase};
use rollwright::types::WorkloadName;

use super::progress_sink;

/// Roll `workload` back to the spec before its current one.
pub async fn rollback(
    config: Config,
    workload: &str,
    destination: Option<&str>,
    timeout: Option<Duration>,
    mut output: Output,
) -> Result<()> {
    let workload =
        WorkloadName::new(workload).map_err(|e| Error::InvalidConfig(e.to_string()))?;

    output.start_timer();
    let output = Arc::new(output);
    let mut diag = Diagnostics::default();

    let store = HistoryStore::from_env(destination)?;
    let history = store.load_all([&workload])?;

    if let Some(previous) = history.previous(&workload) {
        output.progress(&format!(
            "Rolling back {} to {}",
            workload, previous.image
        ));
    }

    let engine = RolloutEngine::new(Arc::new(config.kubectl()), config.rollout_settings())
        .with_sink(progress_sink(&output))
        .with_history(history);

    let timeout = timeout.unwrap_or(config.rollout.timeout);
    let record = engine.rollback(&workload, timeout).await?;

    if let Err(e) = store.save_all(&engine.history()) {
        diag.warn(Warning::HistoryNotSaved(e.to_string()));
    }

    output.json(&record);

    diag.report(&output);

    if record.phase() == RolloutPhase::RolledBack {
        output.success("Rollback complete!");
        return Ok(());
    }

    let phase = record.phase();
    let (kind, message) = match record.failure {
        Some(failure) => (failure.kind, failure.message),
        None => (ErrorKind::Rollback, "rollback did not complete".to_string()),
    };
    Err(Error::RolloutUnsuccessful {
        workload,
        phase,
        kind,
        message,
    })
}
