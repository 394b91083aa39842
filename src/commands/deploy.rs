// ABOUTME: Deploy command implementation.
// ABOUTME: Assembles the pipeline from config, runs hooks around it, and persists history.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use rollwright::cluster::{ClusterClient, InMemoryCluster};
use rollwright::config::{Config, ManifestSource};
use rollwright::diagnostics::{Diagnostics, Warning};
use rollwright::error::{Error, ErrorKind, Result};
use rollwright::history::{HistoryStore, RolloutHistory};
use rollwright::hooks::{HookContext, HookFailure, HookPoint, HookRunner};
use rollwright::output::Output;
use rollwright::pipeline::{
    BuildStage, Coordinator, DeployStage, PipelineRun, PublishStage, Stage, StageContext,
    VerifyStage,
};
use rollwright::progress::ProgressSink;
use rollwright::rollout::RolloutEngine;
use rollwright::types::WorkloadName;

use super::{cancel_on_interrupt, progress_sink};

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub destination: Option<String>,
    pub skip_build: bool,
    pub timeout: Option<Duration>,
    pub no_rollback: bool,
    pub dry_run: bool,
}

/// What a finished pipeline leaves behind.
struct Outcome {
    run: PipelineRun,
    history: RolloutHistory,
    image: Option<String>,
}

/// Run the full pipeline for every configured manifest.
pub async fn deploy(mut config: Config, options: DeployOptions, mut output: Output) -> Result<()> {
    output.start_timer();
    let output = Arc::new(output);
    let mut diag = Diagnostics::default();

    if options.no_rollback {
        config.rollback.automatic = false;
    }

    let sources = config.load_manifests()?;
    let workloads: Vec<WorkloadName> = sources
        .iter()
        .map(|source| source.manifest.deployment.name.clone())
        .collect();

    let store = HistoryStore::from_env(options.destination.as_deref())?;
    let history = store.load_all(&workloads)?;

    output.progress(&format!(
        "Deploying {} ({}){}",
        config.project,
        workloads
            .iter()
            .map(WorkloadName::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        if options.dry_run { " [dry run]" } else { "" }
    ));

    // Hooks touch real systems, so a dry run skips them
    let hooks = (!options.dry_run).then(|| HookRunner::new(&config.root));
    let mut hook_context = HookContext {
        project: config.project.clone(),
        destination: options.destination.clone(),
        workloads: workloads.clone(),
        image: None,
        kube_context: config.cluster.context.clone(),
        run_id: None,
        failure: None,
    };

    if let Some(runner) = &hooks
        && let Some(result) = runner.run(HookPoint::PreDeploy, &hook_context).await
        && !result.success
    {
        if !result.stderr.is_empty() {
            eprintln!("{}", result.stderr);
        }
        return Err(Error::Hook("pre-deploy hook failed".to_string()));
    }

    let sink = progress_sink(&output);
    let cancel = cancel_on_interrupt();

    let outcome = if options.dry_run {
        let cluster = Arc::new(InMemoryCluster::new());
        run_pipeline(cluster, &config, &sources, history, &options, sink, cancel).await?
    } else {
        let cluster = Arc::new(config.kubectl());
        run_pipeline(cluster, &config, &sources, history, &options, sink, cancel).await?
    };

    if !options.dry_run
        && let Err(e) = store.save_all(&outcome.history)
    {
        diag.warn(Warning::HistoryNotSaved(e.to_string()));
    }

    hook_context.image = outcome.image;
    hook_context.run_id = Some(outcome.run.id.to_string());
    output.json(&outcome.run);

    let result = match outcome.run.failure() {
        None => {
            if let Some(runner) = &hooks
                && let Some(result) = runner.run(HookPoint::PostDeploy, &hook_context).await
                && !result.success
            {
                diag.warn(Warning::HookFailed {
                    point: HookPoint::PostDeploy,
                    exit_code: result.exit_code,
                });
            }
            Ok(())
        }
        Some(failed) => {
            let error = failed.error.clone();
            let (kind, message) = match error {
                Some(e) => (e.kind, e.message),
                None => (ErrorKind::Convergence, String::new()),
            };
            hook_context.failure = Some(HookFailure {
                stage: failed.stage.clone(),
                message: message.clone(),
            });
            if let Some(runner) = &hooks
                && let Some(result) = runner.run(HookPoint::OnError, &hook_context).await
                && !result.success
            {
                diag.warn(Warning::HookFailed {
                    point: HookPoint::OnError,
                    exit_code: result.exit_code,
                });
            }
            Err(Error::StageFailed {
                stage: failed.stage.clone(),
                kind,
                message,
            })
        }
    };

    diag.report(&output);

    if result.is_ok() {
        output.success("Deployment complete!");
    }
    result
}

/// Build the stage list for `client` and run it.
async fn run_pipeline<C: ClusterClient + 'static>(
    client: Arc<C>,
    config: &Config,
    sources: &[ManifestSource],
    history: RolloutHistory,
    options: &DeployOptions,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<Outcome> {
    let timeout = options.timeout.unwrap_or(config.rollout.timeout);
    let engine = Arc::new(
        RolloutEngine::new(client, config.rollout_settings())
            .with_sink(sink.clone())
            .with_history(history)
            .with_cancellation(cancel.clone()),
    );

    let mut ctx = StageContext::default();
    let mut stages: Vec<Box<dyn Stage>> = Vec::new();

    if let Some(publisher) = config.publisher()? {
        if options.skip_build || options.dry_run {
            // Assume the configured image is already in the registry
            ctx.image = Some(publisher.image().clone());
        } else {
            let publisher = Arc::new(publisher);
            stages.push(Box::new(BuildStage::new(publisher.clone())));
            stages.push(Box::new(PublishStage::new(publisher)));
        }
    }

    for source in sources {
        stages.push(Box::new(
            DeployStage::new(engine.clone(), source.manifest.clone(), timeout)
                .use_published_image(source.use_published_image),
        ));
    }

    if config.verify {
        let manifests = sources.iter().map(|s| s.manifest.clone()).collect();
        stages.push(Box::new(VerifyStage::new(engine.clone(), manifests)));
    }

    let coordinator = Coordinator::new()
        .with_sink(sink)
        .with_cancellation(cancel);
    let run = coordinator.run_with_context(&stages, &mut ctx).await;

    Ok(Outcome {
        run,
        history: engine.history(),
        image: ctx.image.map(|image| image.to_string()),
    })
}
