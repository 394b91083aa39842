// ABOUTME: Status command implementation.
// ABOUTME: Shows recorded rollout history and, optionally, live readiness from the cluster.

use serde::Serialize;

use rollwright::cluster::{ClusterClient, WorkloadCondition};
use rollwright::config::Config;
use rollwright::error::{Error, Result};
use rollwright::history::{HistoryStore, WorkloadHistory};
use rollwright::output::Output;
use rollwright::rollout::RolloutRecord;
use rollwright::types::WorkloadName;

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub destination: Option<String>,
    pub live: bool,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    workload: &'a WorkloadName,
    current_image: Option<String>,
    previous_image: Option<String>,
    last_rollout: Option<&'a RolloutRecord>,
    live: Option<LiveStatus>,
}

#[derive(Serialize)]
struct LiveStatus {
    desired: u32,
    ready: u32,
    condition: String,
}

pub async fn status(
    config: Config,
    workload: &str,
    options: StatusOptions,
    output: &Output,
) -> Result<()> {
    let workload =
        WorkloadName::new(workload).map_err(|e| Error::InvalidConfig(e.to_string()))?;

    let store = HistoryStore::from_env(options.destination.as_deref())?;
    let entry = store
        .load(&workload)?
        .unwrap_or_else(|| WorkloadHistory::new(workload.clone()));

    let live = if options.live {
        let status = config.kubectl().status(&workload).await?;
        let condition = match status.condition {
            WorkloadCondition::Progressing => "progressing".to_string(),
            WorkloadCondition::Available => "available".to_string(),
            WorkloadCondition::Failed { reason } => format!("failed: {}", reason),
        };
        Some(LiveStatus {
            desired: status.desired_replicas,
            ready: status.ready_replicas,
            condition,
        })
    } else {
        None
    };

    let report = StatusReport {
        workload: &workload,
        current_image: entry.current.as_ref().map(|s| s.image.to_string()),
        previous_image: entry.previous.as_ref().map(|s| s.image.to_string()),
        last_rollout: entry.last_record.as_ref(),
        live,
    };

    output.json(&report);
    print_report(&report, &entry, output);
    Ok(())
}

fn print_report(report: &StatusReport<'_>, entry: &WorkloadHistory, output: &Output) {
    let none = "-".to_string();
    output.progress(&format!("Workload: {}", report.workload));
    output.progress(&format!(
        "Current:  {}",
        report.current_image.as_ref().unwrap_or(&none)
    ));
    output.progress(&format!(
        "Previous: {}",
        report.previous_image.as_ref().unwrap_or(&none)
    ));

    if let Some(record) = report.last_rollout {
        output.progress(&format!(
            "Last rollout: {} {} ({}/{} ready) by {} at {}",
            record.id,
            record.phase(),
            record.readiness.ready,
            record.readiness.desired,
            entry.updated_by,
            record.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        if let Some(ref failure) = record.failure {
            output.progress(&format!("  {}: {}", failure.kind, failure.message));
        }
    } else {
        output.progress("Last rollout: none recorded");
    }

    if let Some(ref live) = report.live {
        output.progress(&format!(
            "Live: {}/{} ready, {}",
            live.ready, live.desired, live.condition
        ));
    }
}
